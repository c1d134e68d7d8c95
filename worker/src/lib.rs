pub mod metrics;
pub mod processor;

use std::time::Duration;

use clap::Parser;
use hashcrack_broker::BrokerOpts;
use hashcrack_lib::retry::RetryPolicy;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "hashcrack-worker",
    about = "A hashcrack worker: pulls task ranges off the broker and hunts for preimages",
    long_about = None
)]
pub struct Cli {
    /// Stable worker identity, also used as the consumer tag
    #[arg(long, env = "WORKER_ID")]
    pub worker_id: Option<String>,

    #[arg(long, env = "RABBITMQ_HOST", default_value = "rabbitmq")]
    pub rabbitmq_host: String,

    #[arg(long, env = "RABBITMQ_PORT", default_value = "5672")]
    pub rabbitmq_port: u16,

    #[arg(long, env = "RABBITMQ_USER", default_value = "guest")]
    pub rabbitmq_user: String,

    #[arg(long, env = "RABBITMQ_PASS", default_value = "guest")]
    pub rabbitmq_pass: String,

    /// Port for the prometheus metrics listener
    #[arg(long, env = "METRICS_PORT", default_value = "8000")]
    pub metrics_port: u16,

    #[arg(long, env = "MAX_RETRIES", default_value = "5")]
    pub max_retries: u32,

    /// Base delay in seconds between broker reconnect attempts
    #[arg(long, env = "RETRY_DELAY", default_value = "2")]
    pub retry_delay: u64,

    /// Set the log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", std::process::id()))
    }

    pub fn broker_opts(&self) -> BrokerOpts {
        BrokerOpts {
            host: self.rabbitmq_host.clone(),
            port: self.rabbitmq_port,
            user: self.rabbitmq_user.clone(),
            pass: self.rabbitmq_pass.clone(),
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                base_delay: Duration::from_secs(self.retry_delay),
                backoff_multiplier: 1.0,
            },
        }
    }
}
