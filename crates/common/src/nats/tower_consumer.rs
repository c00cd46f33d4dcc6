use crate::nats::consumer::{delivery_count, pull_config, rejection, to_consume_request};
use crate::nats::{ConsumeRequest, ConsumeResponse, JetStreamConsumer, NatsConsumerConfig, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info};

/// A NATS consumer that pushes every message, one at a time, through a Tower
/// service stack and applies the returned `ConsumeResponse`.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    config: NatsConsumerConfig,
    service: S,
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: NatsConsumerConfig,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter_subject = %config.filter_subject,
            "creating tower nats consumer"
        );

        let consumer = jetstream
            .create_consumer(pull_config(&config), &config.stream_name)
            .await
            .context("failed to create consumer")?;

        Ok(Self {
            consumer,
            config,
            service,
        })
    }

    /// Run the consumer loop until cancellation
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        debug!(consumer = %self.config.consumer_name, "starting tower nats consumer");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(
                        consumer = %self.config.consumer_name,
                        "received shutdown signal, stopping consumer"
                    );
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(
                            consumer = %self.config.consumer_name,
                            error = %e,
                            "error processing batch"
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        debug!(consumer = %self.config.consumer_name, "consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&mut self) -> Result<()> {
        let messages = self
            .consumer
            .fetch_messages(self.config.batch_size, self.config.max_wait)
            .await?;

        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(());
        }

        debug!(message_count = messages.len(), "received message batch");

        for msg in &messages {
            let response = match self.service.call(to_consume_request(msg)).await {
                Ok(response) => response,
                Err(e) => {
                    error!(subject = %msg.subject, error = %e, "service error processing message");
                    ConsumeResponse::nak(e.to_string())
                }
            };

            settle(msg, response, &self.config).await;
        }

        Ok(())
    }
}

async fn settle(msg: &Message, response: ConsumeResponse, config: &NatsConsumerConfig) {
    let settled = match response {
        ConsumeResponse::Ack => msg.ack().await,
        ConsumeResponse::Nak(_) => msg.ack_with(rejection(delivery_count(msg), config)).await,
        ConsumeResponse::Term(_) => msg.ack_with(jetstream::AckKind::Term).await,
    };

    if let Err(e) = settled {
        error!(subject = %msg.subject, error = %e, "failed to settle message");
    }
}
