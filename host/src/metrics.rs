use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};

lazy_static! {
    pub static ref CRACK_REQUESTS: IntCounter = register_int_counter!(
        "crack_requests_total",
        "Total crack submissions received"
    )
    .unwrap();
    pub static ref STATUS_REQUESTS: IntCounter = register_int_counter!(
        "status_requests_total",
        "Total status lookups received"
    )
    .unwrap();
    pub static ref TASKS_PUBLISHED: IntCounterVec = register_int_counter_vec!(
        "tasks_published_total",
        "Task messages handed to the broker, by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref RESULTS_CONSUMED: IntCounterVec = register_int_counter_vec!(
        "results_consumed_total",
        "Result messages ingested, by reported status",
        &["status"]
    )
    .unwrap();
    pub static ref TASKS_RETRIED: IntCounter = register_int_counter!(
        "tasks_retried_total",
        "Tasks republished by the retry sweeper"
    )
    .unwrap();
    pub static ref REQUESTS_COMPLETED: IntCounter = register_int_counter!(
        "requests_completed_total",
        "Requests that reached READY"
    )
    .unwrap();
}

pub fn inc_crack_requests() {
    CRACK_REQUESTS.inc();
}

pub fn inc_status_requests() {
    STATUS_REQUESTS.inc();
}

pub fn inc_task_published(success: bool) {
    let outcome = if success { "published" } else { "failed" };
    TASKS_PUBLISHED.with_label_values(&[outcome]).inc();
}

pub fn inc_result_consumed(status: &str) {
    RESULTS_CONSUMED.with_label_values(&[status]).inc();
}

pub fn inc_tasks_retried() {
    TASKS_RETRIED.inc();
}

pub fn inc_requests_completed() {
    REQUESTS_COMPLETED.inc();
}
