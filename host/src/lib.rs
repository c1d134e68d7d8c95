pub mod consumer;
pub mod error;
pub mod metrics;
pub mod server;
pub mod submission;
pub mod sweeper;

use std::time::Duration;

use clap::Parser;
use hashcrack_broker::{Broker, BrokerOpts};
use hashcrack_lib::retry::RetryPolicy;
use hashcrack_store::{MongoStoreOpts, Store};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "hashcrack-host",
    about = "The hashcrack manager: partitions searches, dispatches tasks, reconciles results",
    long_about = None
)]
pub struct Cli {
    /// Server bind address
    #[arg(long, env = "MANAGER_ADDRESS", default_value = "0.0.0.0:5055")]
    pub address: String,

    #[arg(long, env = "RABBITMQ_HOST", default_value = "rabbitmq")]
    pub rabbitmq_host: String,

    #[arg(long, env = "RABBITMQ_PORT", default_value = "5672")]
    pub rabbitmq_port: u16,

    #[arg(long, env = "RABBITMQ_USER", default_value = "guest")]
    pub rabbitmq_user: String,

    #[arg(long, env = "RABBITMQ_PASS", default_value = "guest")]
    pub rabbitmq_pass: String,

    #[arg(long, env = "MONGO_HOST", default_value = "mongodb")]
    pub mongo_host: String,

    #[arg(long, env = "MONGO_PORT", default_value = "27017")]
    pub mongo_port: u16,

    /// Replica set name; leave unset for a standalone server
    #[arg(long, env = "MONGO_REPLICA_SET")]
    pub mongo_replica_set: Option<String>,

    /// Use the in-memory store backend instead of MongoDB
    #[arg(long, env = "IN_MEMORY_STORE", default_value_t = false)]
    pub in_memory_store: bool,

    /// Number of candidate indices per task
    #[arg(long, env = "TASK_SIZE", default_value = "100000")]
    pub task_size: u64,

    /// Seconds between retry sweeps over QUEUED tasks
    #[arg(long, env = "RETRY_CHECK_INTERVAL", default_value = "30")]
    pub retry_check_interval: u64,

    #[arg(long, env = "MAX_RETRIES", default_value = "5")]
    pub max_retries: u32,

    /// Base delay in seconds between transport retries
    #[arg(long, env = "RETRY_DELAY", default_value = "2")]
    pub retry_delay: u64,

    #[arg(long, env = "RETRY_BACKOFF_MULTIPLIER", default_value = "1.5")]
    pub retry_backoff_multiplier: f64,

    #[arg(long, env = "MIN_ALLOWED_LENGTH", default_value = "1")]
    pub min_allowed_length: u8,

    #[arg(long, env = "MAX_ALLOWED_LENGTH", default_value = "8")]
    pub max_allowed_length: u8,

    /// Set the log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_secs(self.retry_delay),
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn broker_opts(&self) -> BrokerOpts {
        BrokerOpts {
            host: self.rabbitmq_host.clone(),
            port: self.rabbitmq_port,
            user: self.rabbitmq_user.clone(),
            pass: self.rabbitmq_pass.clone(),
            retry: self.retry_policy(),
        }
    }

    pub fn mongo_opts(&self) -> MongoStoreOpts {
        MongoStoreOpts {
            host: self.mongo_host.clone(),
            port: self.mongo_port,
            replica_set: self.mongo_replica_set.clone(),
            retry: self.retry_policy(),
        }
    }
}

/// Shared state handed to the HTTP handlers, the result consumer and the
/// retry sweeper.
#[derive(Clone)]
pub struct ManagerState {
    pub store: Store,
    pub broker: Broker,
    pub opts: Cli,
    /// Cancelled on shutdown; the consumer and sweeper drain on it.
    pub shutdown: CancellationToken,
}
