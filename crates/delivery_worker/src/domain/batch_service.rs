use crate::domain::{
    BatchError, BatchOutcome, BatchResponse, QueueRecord, RecordError, RecordOutcome,
    RecordResult, RedeliveryPolicy, unwrap_record,
};
use common::domain::{DeliveryClient, DeliveryRequest};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Records delivered at the same time within one batch, at least 1
    pub concurrency: usize,
    pub policy: RedeliveryPolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            policy: RedeliveryPolicy::AtMostOnce,
        }
    }
}

/// Queue event as handed over by a batch-driving host.
/// Records are decoded one by one so a bad record cannot sink the event.
#[derive(Debug, Deserialize)]
struct BatchEvent {
    #[serde(rename = "Records")]
    records: Vec<Value>,
}

/// One batch entry, decoded or already settled as a parse failure
enum BatchItem {
    Record(QueueRecord, Span),
    Undecodable(RecordResult),
}

/// Decode one event record; failures are reported under its `messageId`,
/// or under its position when it has none
fn decode_record(index: usize, value: Value) -> BatchItem {
    let message_id = value
        .get("messageId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string());

    match serde_json::from_value::<QueueRecord>(value) {
        Ok(record) => BatchItem::Record(record, Span::none()),
        Err(e) => {
            warn!(message_id = %message_id, error = %e, "undecodable queue record");
            BatchItem::Undecodable(RecordResult::new(
                message_id,
                RecordOutcome::ParseFailed(RecordError::ParseError(format!("queue record: {e}"))),
            ))
        }
    }
}

/// Backend to client direction: unwrap each record and push it to its connection.
///
/// A record never affects its neighbours. Parse failures leave the record
/// unacknowledged; failed deliveries only do so under
/// [`RedeliveryPolicy::RedeliverFailedDeliveries`].
pub struct DeliveryBatchService {
    client: Arc<dyn DeliveryClient>,
    settings: BatchSettings,
}

impl DeliveryBatchService {
    pub fn new(client: Arc<dyn DeliveryClient>, settings: BatchSettings) -> Self {
        Self { client, settings }
    }

    pub async fn process_batch(&self, records: Vec<QueueRecord>) -> BatchOutcome {
        self.process_items(
            records
                .into_iter()
                .map(|record| BatchItem::Record(record, Span::none()))
                .collect(),
        )
        .await
    }

    /// Like [`Self::process_batch`], with each record handled inside its own span
    pub async fn process_traced_batch(&self, records: Vec<(QueueRecord, Span)>) -> BatchOutcome {
        self.process_items(
            records
                .into_iter()
                .map(|(record, span)| BatchItem::Record(record, span))
                .collect(),
        )
        .await
    }

    #[instrument(skip_all, fields(batch_size = items.len()))]
    async fn process_items(&self, items: Vec<BatchItem>) -> BatchOutcome {
        // buffered keeps input order whatever the completion order
        let results: Vec<RecordResult> = stream::iter(items)
            .map(|item| async move {
                match item {
                    BatchItem::Record(record, span) => {
                        let delivery = span.in_scope(|| self.process_record(&record));
                        delivery.instrument(span).await
                    }
                    BatchItem::Undecodable(result) => result,
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let outcome = BatchOutcome::aggregate(results, self.settings.policy);

        info!(
            processed = outcome.processed,
            delivered = outcome.delivered,
            delivery_failed = outcome.delivery_failed,
            failed = outcome.failed.len(),
            "delivery batch complete"
        );

        outcome
    }

    #[instrument(skip_all, fields(message_id = %record.message_id))]
    pub async fn process_record(&self, record: &QueueRecord) -> RecordResult {
        let message = match unwrap_record(record) {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %error, "failed to unwrap queue record");
                return RecordResult::new(&record.message_id, RecordOutcome::ParseFailed(error));
            }
        };

        let connection_id = message.connection_id.clone();
        let request = DeliveryRequest::from(message);

        let outcome = match self.client.send_to_connection(&request).await {
            Some(_) => {
                debug!(connection_id = %connection_id, "message delivered");
                RecordOutcome::Delivered
            }
            None => {
                warn!(connection_id = %connection_id, "message could not be delivered");
                RecordOutcome::DeliveryFailed
            }
        };

        RecordResult::new(&record.message_id, outcome)
    }

    /// Run a `{"Records": [...]}` event through the pipeline and report the
    /// records to redeliver
    pub async fn handle_event(&self, event: &str) -> Result<BatchResponse, BatchError> {
        let event: BatchEvent = serde_json::from_str(event)?;
        let items = event
            .records
            .into_iter()
            .enumerate()
            .map(|(index, value)| decode_record(index, value))
            .collect();

        Ok(self.process_items(items).await.response())
    }
}
