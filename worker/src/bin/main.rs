use std::time::Duration;

use clap::Parser;
use futures_util::StreamExt;
use hashcrack_broker::{Broker, Publisher, TASK_QUEUE};
use hashcrack_lib::message::TaskMessage;
use hashcrack_worker::{metrics, processor::TaskProcessor, Cli};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
    Consumer,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let opts = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level)),
        )
        .init();

    let worker_id = opts.worker_id();
    info!("initializing worker {worker_id}");

    let _metrics_listener = metrics::serve(opts.metrics_port);

    let broker = Broker::connect(&opts.broker_opts()).await?;
    let processor = TaskProcessor::new(worker_id.clone());

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    run(&opts, &broker, &processor, &worker_id, &shutdown).await?;

    if let Err(err) = broker.close().await {
        warn!("error closing broker connection: {err}");
    }
    info!("worker {worker_id} stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
        }
        shutdown.cancel();
    });
}

/// Consume `task.queue` with prefetch 1 until shutdown. Reconnects with a
/// linearly growing delay, giving up after the configured attempt cap.
async fn run(
    opts: &Cli,
    broker: &Broker,
    processor: &TaskProcessor,
    worker_id: &str,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let mut failed_connects = 0u32;
    while !shutdown.is_cancelled() {
        let consumer = match broker.consumer(TASK_QUEUE, 1, worker_id).await {
            Ok(consumer) => {
                failed_connects = 0;
                info!("waiting for tasks on {TASK_QUEUE}");
                consumer
            }
            Err(err) => {
                failed_connects += 1;
                if failed_connects >= opts.max_retries {
                    anyhow::bail!("could not consume from {TASK_QUEUE}: {err}");
                }
                let delay = Duration::from_secs(opts.retry_delay * u64::from(failed_connects));
                warn!("task consumer connect failed: {err}, retrying in {delay:?}");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }
        };
        consume(broker, processor, consumer, shutdown).await;
    }
    Ok(())
}

/// Drain deliveries until the stream ends (the caller reconnects) or
/// shutdown is signaled.
async fn consume(
    broker: &Broker,
    processor: &TaskProcessor,
    mut consumer: Consumer,
    shutdown: &CancellationToken,
) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = consumer.next() => next,
        };
        let delivery = match delivery {
            Some(Ok(delivery)) => delivery,
            Some(Err(err)) => {
                warn!("task consumer transport error: {err}");
                return;
            }
            None => {
                warn!("task stream closed");
                return;
            }
        };
        if shutdown.is_cancelled() {
            // Hand the delivery back so another worker picks it up.
            nack(delivery, true).await;
            return;
        }
        handle_delivery(broker, processor, delivery).await;
    }
}

async fn handle_delivery(broker: &Broker, processor: &TaskProcessor, delivery: Delivery) {
    let task: TaskMessage = match serde_json::from_slice(&delivery.data) {
        Ok(task) => task,
        Err(err) => {
            // Poison message: requeueing would loop it forever.
            error!("dropping undecodable task message: {err}");
            nack(delivery, false).await;
            return;
        }
    };

    let worker = processor.clone();
    let message = task.clone();
    let result = match tokio::task::spawn_blocking(move || worker.process(&message)).await {
        Ok(result) => result,
        Err(err) => {
            error!(task_id = %task.task_id, "processing aborted: {err}");
            nack(delivery, true).await;
            return;
        }
    };

    // The task is only acknowledged once its result is safely on the
    // result queue; otherwise another worker redoes the range.
    match broker.publish_result(&result).await {
        Ok(()) => {
            if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                error!(task_id = %task.task_id, "failed to ack task: {err}");
            } else {
                info!(task_id = %task.task_id, "task completed and acknowledged");
            }
        }
        Err(err) => {
            error!(task_id = %task.task_id, "failed to publish result: {err}");
            nack(delivery, true).await;
        }
    }
}

async fn nack(delivery: Delivery, requeue: bool) {
    if let Err(err) = delivery
        .nack(BasicNackOptions {
            requeue,
            ..Default::default()
        })
        .await
    {
        error!("failed to nack task message: {err}");
    }
}
