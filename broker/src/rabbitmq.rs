use std::sync::Arc;

use hashcrack_lib::{
    message::{ResultMessage, TaskMessage},
    retry::{run_with_retries, RetryPolicy},
};
use lapin::{
    options::{
        BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
        QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{BrokerError, BrokerResult, Publisher, RESULT_QUEUE, TASK_QUEUE};

/// Persistent delivery, survives a broker restart together with the
/// durable queues.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

#[derive(Debug, Clone)]
pub struct BrokerOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub retry: RetryPolicy,
}

impl BrokerOpts {
    fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.user, self.pass, self.host, self.port
        )
    }
}

struct Inner {
    connection: Connection,
    publish_channel: Channel,
}

/// RabbitMQ connection manager.
///
/// Publishes run on a dedicated channel in confirm mode; each consumer gets
/// its own channel so prefetch windows do not interfere. A lost connection
/// is re-dialed on the next publish or consumer build, with the policy's
/// capped retries per dial.
#[derive(Clone)]
pub struct Broker {
    opts: BrokerOpts,
    inner: Arc<RwLock<Inner>>,
}

impl Broker {
    pub async fn connect(opts: &BrokerOpts) -> BrokerResult<Self> {
        let inner = Self::open(opts).await?;
        Ok(Self {
            opts: opts.clone(),
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    async fn open(opts: &BrokerOpts) -> BrokerResult<Inner> {
        let uri = opts.amqp_uri();
        let connection = run_with_retries(&opts.retry, || async {
            Connection::connect(&uri, ConnectionProperties::default()).await
        })
        .await?;

        let publish_channel = connection.create_channel().await?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        declare_queues(&publish_channel).await?;

        info!(host = %opts.host, port = opts.port, "connected to RabbitMQ");
        Ok(Inner {
            connection,
            publish_channel,
        })
    }

    /// Re-dial if the connection is gone. Concurrent callers coalesce on
    /// the write lock and only the first one reconnects.
    async fn ensure_connection(&self) -> BrokerResult<()> {
        {
            let inner = self.inner.read().await;
            if inner.connection.status().connected() {
                return Ok(());
            }
        }
        let mut inner = self.inner.write().await;
        if inner.connection.status().connected() {
            return Ok(());
        }
        warn!("RabbitMQ connection lost, reconnecting");
        *inner = Self::open(&self.opts).await?;
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.connection.status().connected()
    }

    /// Open a dedicated channel and start consuming `queue` with the given
    /// prefetch window. Acknowledgement is manual, through the deliveries.
    pub async fn consumer(
        &self,
        queue: &str,
        prefetch: u16,
        consumer_tag: &str,
    ) -> BrokerResult<Consumer> {
        self.ensure_connection().await?;
        let inner = self.inner.read().await;
        let channel = inner.connection.create_channel().await?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;
        declare_queues(&channel).await?;
        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    pub async fn close(&self) -> BrokerResult<()> {
        let inner = self.inner.read().await;
        inner.connection.close(200, "shutting down").await?;
        Ok(())
    }

    async fn publish_json<T: Serialize>(&self, queue: &str, message: &T) -> BrokerResult<()> {
        let payload = serde_json::to_vec(message)?;
        self.ensure_connection().await?;
        let inner = self.inner.read().await;
        let confirmation = inner
            .publish_channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(BrokerError::Unconfirmed),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for Broker {
    async fn publish_task(&self, message: &TaskMessage) -> BrokerResult<()> {
        self.publish_json(TASK_QUEUE, message).await
    }

    async fn publish_result(&self, message: &ResultMessage) -> BrokerResult<()> {
        self.publish_json(RESULT_QUEUE, message).await
    }
}

async fn declare_queues(channel: &Channel) -> BrokerResult<()> {
    let options = QueueDeclareOptions {
        durable: true,
        ..Default::default()
    };
    channel
        .queue_declare(TASK_QUEUE, options, FieldTable::default())
        .await?;
    channel
        .queue_declare(RESULT_QUEUE, options, FieldTable::default())
        .await?;
    Ok(())
}
