use axum::{body::Body, http::header, http::StatusCode, response::Response, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_int_counter_vec, register_int_gauge, Encoder, Gauge, IntCounterVec,
    IntGauge, TextEncoder,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

lazy_static! {
    pub static ref TASKS_IN_PROGRESS: IntGauge = register_int_gauge!(
        "worker_tasks_in_progress",
        "Tasks currently being processed"
    )
    .unwrap();
    pub static ref TASKS_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "worker_tasks_processed_total",
        "Tasks processed, by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref HASH_RATE: Gauge = register_gauge!(
        "worker_combinations_per_second",
        "Candidate hash rate of the task in progress, from its own elapsed time"
    )
    .unwrap();
}

pub fn inc_tasks_in_progress() {
    TASKS_IN_PROGRESS.inc();
}

pub fn dec_tasks_in_progress() {
    TASKS_IN_PROGRESS.dec();
}

pub fn inc_tasks_processed(outcome: &str) {
    TASKS_PROCESSED.with_label_values(&[outcome]).inc();
}

pub fn observe_hash_rate(rate: f64) {
    HASH_RATE.set(rate);
}

/// Serve the prometheus exposition endpoint on `port`.
pub fn serve(port: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        let router = Router::new().route("/metrics", get(handler));
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                info!("metrics listener on port {port}");
                if let Err(err) = axum::serve(listener, router).await {
                    error!("metrics listener failed: {err}");
                }
            }
            Err(err) => error!("could not bind metrics listener on port {port}: {err}"),
        }
    })
}

async fn handler() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    let mf = prometheus::gather();
    if encoder.encode(&mf, &mut buffer).is_err() {
        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return resp;
    }
    Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
