use hashcrack_broker::Publisher;
use hashcrack_lib::keyspace::{partition, total_combinations};
use hashcrack_store::{CrackRequest, StateStore, TaskRecord};
use tracing::{error, info, warn};

use crate::{
    error::{HostError, HostResult},
    metrics,
};

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub request_id: String,
    pub task_total: usize,
    pub publish_failures: usize,
}

/// The submission path: persist the request and every task row first, then
/// hand the task messages to the broker. Tasks whose publish fails are
/// flagged `QUEUED` + `needs_retry` for the sweeper; the submission itself
/// still succeeds.
///
/// `hash` must already be validated and normalized to lowercase.
pub async fn submit<S, P>(
    store: &S,
    publisher: &P,
    hash: String,
    max_length: u8,
    task_size: u64,
) -> HostResult<SubmissionOutcome>
where
    S: StateStore,
    P: Publisher,
{
    let request = CrackRequest::new(hash, max_length);
    store.insert_request(&request).await?;

    let total = total_combinations(max_length);
    let tasks: Vec<TaskRecord> = partition(total, task_size)
        .into_iter()
        .map(|p| TaskRecord::new(&request, p))
        .collect();

    if let Err(err) = store.insert_tasks(&tasks).await {
        // The request row exists but has no recoverable work items; close it
        // out so the client sees a terminal state instead of a stuck one.
        error!(request_id = %request.request_id, "failed to persist tasks: {err}");
        if let Err(mark_err) = store.mark_request_error(&request.request_id).await {
            error!(request_id = %request.request_id, "failed to mark request ERROR: {mark_err}");
        }
        return Err(HostError::Store(err));
    }

    let mut publish_failures = 0;
    for task in &tasks {
        match publisher.publish_task(&task.to_message()).await {
            Ok(()) => metrics::inc_task_published(true),
            Err(err) => {
                warn!(task_id = %task.task_id, "failed to publish task: {err}");
                metrics::inc_task_published(false);
                store.mark_task_queued(&task.task_id).await?;
                publish_failures += 1;
            }
        }
    }

    if publish_failures > 0 {
        warn!(
            request_id = %request.request_id,
            "{publish_failures}/{} task publishes failed, sweeper will retry",
            tasks.len()
        );
    }
    info!(
        request_id = %request.request_id,
        total_combinations = total,
        tasks = tasks.len(),
        "accepted crack request"
    );

    Ok(SubmissionOutcome {
        request_id: request.request_id,
        task_total: tasks.len(),
        publish_failures,
    })
}
