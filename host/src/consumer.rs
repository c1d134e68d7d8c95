use std::time::Duration;

use futures_util::StreamExt;
use hashcrack_broker::RESULT_QUEUE;
use hashcrack_lib::message::ResultMessage;
use hashcrack_store::{StateStore, StoreResult};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
    Consumer,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{metrics, ManagerState};

const CONSUMER_TAG: &str = "manager.results";
const PREFETCH: u16 = 10;
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Start the result-ingestion consumer on its own task. It reconnects with
/// capped exponential backoff and drains when the state's shutdown token is
/// cancelled.
pub fn start(state: ManagerState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: ManagerState) {
    let policy = state.opts.retry_policy();
    let mut failed_connects = 0u32;

    while !state.shutdown.is_cancelled() {
        match state.broker.consumer(RESULT_QUEUE, PREFETCH, CONSUMER_TAG).await {
            Ok(consumer) => {
                failed_connects = 0;
                info!("result consumer started on {RESULT_QUEUE}");
                consume(&state, consumer).await;
            }
            Err(err) => {
                let delay = policy.delay(failed_connects).min(MAX_RECONNECT_DELAY);
                warn!("result consumer connect failed: {err}, retrying in {delay:?}");
                failed_connects = failed_connects.saturating_add(1);
                tokio::select! {
                    _ = state.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    info!("result consumer stopped");
}

/// Drain deliveries until the stream ends (transport loss, the caller
/// reconnects) or shutdown is signaled.
async fn consume(state: &ManagerState, mut consumer: Consumer) {
    loop {
        let delivery = tokio::select! {
            _ = state.shutdown.cancelled() => return,
            next = consumer.next() => next,
        };
        match delivery {
            Some(Ok(delivery)) => handle_delivery(&state.store, delivery).await,
            Some(Err(err)) => {
                warn!("result consumer transport error: {err}");
                return;
            }
            None => {
                warn!("result consumer stream closed");
                return;
            }
        }
    }
}

async fn handle_delivery<S: StateStore>(store: &S, delivery: Delivery) {
    let message: ResultMessage = match serde_json::from_slice(&delivery.data) {
        Ok(message) => message,
        Err(err) => {
            // Poison message: requeueing would loop it forever.
            error!("dropping undecodable result message: {err}");
            if let Err(nack_err) = delivery
                .nack(BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                })
                .await
            {
                error!("failed to nack poison result: {nack_err}");
            }
            return;
        }
    };

    match ingest(store, &message).await {
        Ok(completed_request) => {
            metrics::inc_result_consumed(if message.results.is_empty() {
                "empty"
            } else {
                "matched"
            });
            if completed_request {
                metrics::inc_requests_completed();
                info!(request_id = %message.request_id, "request completed");
            }
            if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                error!("failed to ack result message: {err}");
            }
        }
        Err(err) => {
            // Let the broker redeliver; ingestion is idempotent.
            error!(task_id = %message.task_id, "error handling result: {err}");
            if let Err(nack_err) = delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
            {
                error!("failed to nack result message: {nack_err}");
            }
        }
    }
}

/// Apply one result message to the state store and run the completion
/// check. Returns whether this message transitioned the request to READY.
///
/// Safe under redelivery: the task update is a no-op once the task is
/// terminal, the result append is a set union, and the READY transition is
/// conditional on the request still being IN_PROGRESS.
pub async fn ingest<S: StateStore>(store: &S, message: &ResultMessage) -> StoreResult<bool> {
    info!(
        task_id = %message.task_id,
        status = ?message.status,
        matches = message.results.len(),
        "received task result"
    );
    store
        .complete_task(&message.task_id, message.status.into(), &message.results)
        .await?;

    if !message.results.is_empty() {
        store
            .add_request_results(&message.request_id, &message.results)
            .await?;
    }

    let counts = store.request_task_counts(&message.request_id).await?;
    if counts.total > 0 && counts.terminal == counts.total {
        return store.mark_request_ready(&message.request_id).await;
    }
    Ok(false)
}
