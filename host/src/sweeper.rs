use std::time::Duration;

use hashcrack_broker::Publisher;
use hashcrack_store::{StateStore, StoreResult};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{metrics, ManagerState};

/// Start the periodic retry sweeper on its own task. It drains when the
/// state's shutdown token is cancelled.
pub fn start(state: ManagerState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: ManagerState) {
    let period = Duration::from_secs(state.opts.retry_check_interval);
    let mut ticker = tokio::time::interval(period);
    // The first tick fires immediately; skip it so a restart does not race
    // the submission path.
    ticker.tick().await;
    info!("retry sweeper started, interval {period:?}");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match sweep_once(&state.store, &state.broker).await {
            Ok(0) => {}
            Ok(retried) => info!("sweeper republished {retried} tasks"),
            Err(err) => error!("retry sweep failed: {err}"),
        }
    }
    info!("retry sweeper stopped");
}

/// One sweep: republish every task flagged `needs_retry` and clear the flag
/// on publish success. The flag survives a failed publish, so the task is
/// picked up again next sweep; task status is never touched here.
pub async fn sweep_once<S, P>(store: &S, publisher: &P) -> StoreResult<usize>
where
    S: StateStore,
    P: Publisher,
{
    let tasks = store.tasks_needing_retry().await?;
    let mut retried = 0;
    for task in tasks {
        match publisher.publish_task(&task.to_message()).await {
            Ok(()) => {
                store.clear_retry_flag(&task.task_id).await?;
                metrics::inc_tasks_retried();
                info!(task_id = %task.task_id, "republished task");
                retried += 1;
            }
            Err(err) => {
                warn!(task_id = %task.task_id, "failed to republish task: {err}");
            }
        }
    }
    Ok(retried)
}
