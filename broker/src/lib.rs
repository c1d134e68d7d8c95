use hashcrack_lib::message::{ResultMessage, TaskMessage};

pub use rabbitmq::{Broker, BrokerOpts};

pub mod rabbitmq;

/// Durable queue carrying [`TaskMessage`]s from the manager to workers.
pub const TASK_QUEUE: &str = "task.queue";

/// Durable queue carrying [`ResultMessage`]s from workers to the manager.
pub const RESULT_QUEUE: &str = "result.queue";

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker transport error: {0}")]
    Transport(#[from] lapin::Error),

    #[error("broker rejected the publish")]
    Unconfirmed,

    #[error("message encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Publishing seam between the coordination logic and the transport.
///
/// The submission path and the retry sweeper only depend on this trait, so
/// tests can drive them with a scripted publisher instead of a live broker.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_task(&self, message: &TaskMessage) -> BrokerResult<()>;

    async fn publish_result(&self, message: &ResultMessage) -> BrokerResult<()>;
}
