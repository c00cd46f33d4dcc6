use crate::domain::{EnvelopeBuilder, EnvelopeDefaults, IngestionService};
use crate::nats::{IngressConsumerService, NatsEnvelopeProducer};
use common::nats::{
    JetStreamConsumer, JetStreamPublisher, NatsConsumeLoggingLayer, NatsConsumeLoggingService,
    NatsConsumeTracingConfig, NatsConsumeTracingLayer, NatsConsumeTracingService,
    NatsConsumerConfig, TowerConsumer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

pub struct IngressWorkerConfig {
    pub ingress_stream: String,
    pub consumer_name: String,
    pub messages_topic: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    /// Wait before a request whose publish failed is offered again
    pub nak_delay_secs: u64,
    pub default_model_interface: String,
}

/// Consumer stack: Tracing -> Logging -> IngressConsumerService
pub type IngressServiceStack =
    NatsConsumeTracingService<NatsConsumeLoggingService<IngressConsumerService>>;

/// Consumes gateway ingestion requests and publishes envelopes onto the messages topic
pub struct IngressWorker {
    consumer: TowerConsumer<IngressServiceStack>,
}

impl IngressWorker {
    pub async fn new(
        consumer_client: Arc<dyn JetStreamConsumer>,
        publisher_client: Arc<dyn JetStreamPublisher>,
        config: IngressWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!(
            ingress_stream = %config.ingress_stream,
            messages_topic = %config.messages_topic,
            "initializing ingress worker"
        );

        let producer = Arc::new(NatsEnvelopeProducer::new(
            publisher_client,
            config.messages_topic.clone(),
        ));
        let builder = EnvelopeBuilder::new(EnvelopeDefaults {
            model_interface: config.default_model_interface.clone(),
        });
        let ingestion_service = Arc::new(IngestionService::new(builder, producer));

        let service = ServiceBuilder::new()
            .layer(NatsConsumeTracingLayer::new(NatsConsumeTracingConfig::new(
                config.consumer_name.clone(),
            )))
            .layer(NatsConsumeLoggingLayer::new())
            .service(IngressConsumerService::new(ingestion_service));

        let consumer = TowerConsumer::new(
            consumer_client,
            NatsConsumerConfig {
                filter_subject: format!("{}.>", config.ingress_stream),
                stream_name: config.ingress_stream,
                consumer_name: config.consumer_name,
                batch_size: config.nats_batch_size,
                max_wait: Duration::from_secs(config.nats_batch_wait_secs),
                // publish failures retry until the messages topic is reachable
                max_deliver: 0,
                nak_delay: Some(Duration::from_secs(config.nak_delay_secs)),
            },
            service,
        )
        .await?;

        Ok(Self { consumer })
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.consumer.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_nats::jetstream::consumer::pull::Config;
    use common::nats::{MockJetStreamConsumer, MockJetStreamPublisher, MockPullConsumer};

    fn config() -> IngressWorkerConfig {
        IngressWorkerConfig {
            ingress_stream: "chat_ingress".to_string(),
            consumer_name: "chat-relay-ingress".to_string(),
            messages_topic: "chat_messages".to_string(),
            nats_batch_size: 10,
            nats_batch_wait_secs: 5,
            nak_delay_secs: 5,
            default_model_interface: "langchain".to_string(),
        }
    }

    #[tokio::test]
    async fn test_worker_consumes_whole_ingress_stream() {
        let mut consumer_client = MockJetStreamConsumer::new();
        consumer_client
            .expect_create_consumer()
            .withf(|config: &Config, stream_name: &str| {
                stream_name == "chat_ingress"
                    && config.filter_subject == "chat_ingress.>"
                    && config.durable_name.as_deref() == Some("chat-relay-ingress")
            })
            .times(1)
            .returning(|_, _| {
                let mut pull = MockPullConsumer::new();
                pull.expect_fetch_messages().returning(|_, _| Ok(vec![]));
                Ok(Box::new(pull))
            });

        let worker = IngressWorker::new(
            Arc::new(consumer_client),
            Arc::new(MockJetStreamPublisher::new()),
            config(),
        )
        .await
        .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        assert!(worker.run(token).await.is_ok());
    }

    #[tokio::test]
    async fn test_worker_creation_fails_without_stream() {
        let mut consumer_client = MockJetStreamConsumer::new();
        consumer_client
            .expect_create_consumer()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("stream not found")));

        let result = IngressWorker::new(
            Arc::new(consumer_client),
            Arc::new(MockJetStreamPublisher::new()),
            config(),
        )
        .await;

        assert!(result.is_err());
    }
}
