use crate::nats::{ConsumeRequest, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, Message};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-message verdict for one fetched batch.
/// Indices refer to positions in the batch handed to the processor.
#[derive(Debug, Default, PartialEq)]
pub struct ProcessingResult {
    /// Messages to acknowledge
    pub ack: Vec<usize>,
    /// Messages to reject for redelivery, with an optional reason
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }

    pub fn new(ack: Vec<usize>, nak: Vec<(usize, Option<String>)>) -> Self {
        Self { ack, nak }
    }
}

/// Batch processor invoked once per fetched batch.
/// An `Err` means the batch as a whole could not be handled; every message is rejected.
pub type BatchProcessor =
    Box<dyn Fn(Vec<ConsumeRequest>) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Settings for a durable pull consumer
#[derive(Debug, Clone)]
pub struct NatsConsumerConfig {
    pub stream_name: String,
    pub consumer_name: String,
    pub filter_subject: String,
    pub batch_size: usize,
    pub max_wait: Duration,
    /// Deliveries per message before the server gives up on it, 0 for unlimited
    pub max_deliver: i64,
    /// Delay the server waits before redelivering a nak'd message
    pub nak_delay: Option<Duration>,
}

/// JetStream consumer that hands whole batches to a `BatchProcessor` and
/// applies the returned ack/nak verdicts message by message
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    config: NatsConsumerConfig,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: NatsConsumerConfig,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter_subject = %config.filter_subject,
            "creating batch consumer"
        );

        let consumer = jetstream
            .create_consumer(pull_config(&config), &config.stream_name)
            .await
            .context("failed to create consumer")?;

        info!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            "batch consumer created"
        );

        Ok(Self {
            consumer,
            config,
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!(consumer = %self.config.consumer_name, "starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(consumer = %self.config.consumer_name, "received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(consumer = %self.config.consumer_name, error = %e, "error processing batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!(consumer = %self.config.consumer_name, "consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let messages = self
            .consumer
            .fetch_messages(self.config.batch_size, self.config.max_wait)
            .await?;

        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(());
        }

        debug!(message_count = messages.len(), "received message batch");

        let requests = messages.iter().map(to_consume_request).collect();
        let result = match (self.processor)(requests).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "processor returned error, rejecting all messages");
                ProcessingResult::nak_all(messages.len(), Some(e.to_string()))
            }
        };

        apply_verdicts(&messages, result, &self.config).await;
        Ok(())
    }
}

pub(crate) fn pull_config(config: &NatsConsumerConfig) -> jetstream::consumer::pull::Config {
    jetstream::consumer::pull::Config {
        name: Some(config.consumer_name.clone()),
        durable_name: Some(config.consumer_name.clone()),
        filter_subject: config.filter_subject.clone(),
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        max_deliver: config.max_deliver,
        ..Default::default()
    }
}

/// How to reject a message that has been delivered `delivered` times.
///
/// The last allowed delivery is terminated so the server stops offering it;
/// earlier ones are nak'd with the configured delay.
pub(crate) fn rejection(delivered: i64, config: &NatsConsumerConfig) -> jetstream::AckKind {
    if config.max_deliver > 0 && delivered >= config.max_deliver {
        jetstream::AckKind::Term
    } else {
        jetstream::AckKind::Nak(config.nak_delay)
    }
}

pub(crate) fn delivery_count(msg: &Message) -> i64 {
    msg.info().map(|info| info.delivered).unwrap_or(1)
}

pub(crate) fn to_consume_request(msg: &Message) -> ConsumeRequest {
    let sequence = msg.info().map(|info| info.stream_sequence).unwrap_or_default();
    ConsumeRequest::new(
        msg.subject.to_string(),
        Bytes::copy_from_slice(&msg.payload),
        msg.headers.clone(),
    )
    .with_sequence(sequence)
}

async fn apply_verdicts(messages: &[Message], result: ProcessingResult, config: &NatsConsumerConfig) {
    for idx in result.ack {
        match messages.get(idx) {
            Some(msg) => {
                if let Err(e) = msg.ack().await {
                    error!(error = %e, message_index = idx, "failed to acknowledge message");
                }
            }
            None => warn!(message_index = idx, batch_size = messages.len(), "invalid ack index in ProcessingResult"),
        }
    }

    for (idx, reason) in result.nak {
        match messages.get(idx) {
            Some(msg) => {
                let delivered = delivery_count(msg);
                let kind = rejection(delivered, config);
                if matches!(kind, jetstream::AckKind::Term) {
                    error!(
                        message_index = idx,
                        subject = %msg.subject,
                        delivered,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "delivery limit reached, dropping message"
                    );
                } else {
                    warn!(
                        message_index = idx,
                        subject = %msg.subject,
                        delivered,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "rejecting message for redelivery"
                    );
                }
                if let Err(e) = msg.ack_with(kind).await {
                    error!(error = %e, message_index = idx, "failed to reject message");
                }
            }
            None => warn!(message_index = idx, batch_size = messages.len(), "invalid nak index in ProcessingResult"),
        }
    }
}
