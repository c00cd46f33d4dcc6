use crate::domain::{BatchSettings, DeliveryBatchService, RedeliveryPolicy};
use crate::nats::create_delivery_processor;
use common::domain::{DeliveryClient, Direction};
use common::nats::{JetStreamConsumer, NatsConsumer, NatsConsumerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct DeliveryWorkerConfig {
    pub messages_topic: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    /// Deliveries of one message before it is dropped, 0 for unlimited
    pub max_deliver: i64,
    pub nak_delay_secs: u64,
    pub delivery_concurrency: usize,
    pub redeliver_failed_deliveries: bool,
}

/// Pulls outbound envelopes from the messages topic and pushes them to client connections
pub struct DeliveryWorker {
    consumer: NatsConsumer,
}

impl DeliveryWorker {
    pub async fn new(
        consumer_client: Arc<dyn JetStreamConsumer>,
        delivery_client: Arc<dyn DeliveryClient>,
        config: DeliveryWorkerConfig,
    ) -> anyhow::Result<Self> {
        let settings = BatchSettings {
            concurrency: config.delivery_concurrency,
            policy: RedeliveryPolicy::from_flag(config.redeliver_failed_deliveries),
        };

        info!(
            messages_topic = %config.messages_topic,
            concurrency = settings.concurrency,
            policy = ?settings.policy,
            "initializing delivery worker"
        );

        let service = Arc::new(DeliveryBatchService::new(delivery_client, settings));

        let consumer = NatsConsumer::new(
            consumer_client,
            NatsConsumerConfig {
                filter_subject: format!(
                    "{}.{}",
                    config.messages_topic,
                    Direction::Out.subject_token()
                ),
                stream_name: config.messages_topic,
                consumer_name: config.consumer_name,
                batch_size: config.nats_batch_size,
                max_wait: Duration::from_secs(config.nats_batch_wait_secs),
                max_deliver: config.max_deliver,
                nak_delay: Some(Duration::from_secs(config.nak_delay_secs)),
            },
            create_delivery_processor(service),
        )
        .await?;

        Ok(Self { consumer })
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.consumer.run(ctx).await
    }
}
