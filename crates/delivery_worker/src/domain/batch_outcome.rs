use crate::domain::{ErrorKind, RecordError};
use serde::{Deserialize, Serialize};

/// Terminal state of one record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Delivered,
    DeliveryFailed,
    ParseFailed(RecordError),
}

/// Outcome of one record, tagged with its queue message id
#[derive(Debug, Clone, PartialEq)]
pub struct RecordResult {
    pub message_id: String,
    pub outcome: RecordOutcome,
}

impl RecordResult {
    pub fn new(message_id: impl Into<String>, outcome: RecordOutcome) -> Self {
        Self {
            message_id: message_id.into(),
            outcome,
        }
    }
}

/// What happens to records whose delivery failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedeliveryPolicy {
    /// Failed deliveries are acknowledged and dropped
    #[default]
    AtMostOnce,
    /// Failed deliveries stay unacknowledged and are redelivered
    RedeliverFailedDeliveries,
}

impl RedeliveryPolicy {
    pub fn from_flag(redeliver_failed_deliveries: bool) -> Self {
        if redeliver_failed_deliveries {
            Self::RedeliverFailedDeliveries
        } else {
            Self::AtMostOnce
        }
    }
}

/// A record left unacknowledged
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    /// Position in the batch
    pub index: usize,
    pub message_id: String,
    pub error: RecordError,
}

impl FailedRecord {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Per-batch aggregate driving acknowledgement.
///
/// `processed` counts acknowledged records, so `processed + failed.len()` is
/// the batch size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub delivered: usize,
    pub delivery_failed: usize,
    pub failed: Vec<FailedRecord>,
}

impl BatchOutcome {
    /// Reduce per-record results, in batch order, into one outcome
    pub fn aggregate(results: Vec<RecordResult>, policy: RedeliveryPolicy) -> Self {
        let mut outcome = BatchOutcome::default();

        for (index, result) in results.into_iter().enumerate() {
            let failure = match result.outcome {
                RecordOutcome::Delivered => {
                    outcome.delivered += 1;
                    None
                }
                RecordOutcome::DeliveryFailed => {
                    outcome.delivery_failed += 1;
                    match policy {
                        RedeliveryPolicy::AtMostOnce => None,
                        RedeliveryPolicy::RedeliverFailedDeliveries => {
                            Some(RecordError::DeliveryFailed(result.message_id.clone()))
                        }
                    }
                }
                RecordOutcome::ParseFailed(error) => Some(error),
            };

            match failure {
                Some(error) => outcome.failed.push(FailedRecord {
                    index,
                    message_id: result.message_id,
                    error,
                }),
                None => outcome.processed += 1,
            }
        }

        outcome
    }

    pub fn total(&self) -> usize {
        self.processed + self.failed.len()
    }

    /// Failure recorded for the record at `index`, if it is left unacknowledged
    pub fn failure_at(&self, index: usize) -> Option<&RecordError> {
        self.failed
            .iter()
            .find(|failed| failed.index == index)
            .map(|failed| &failed.error)
    }

    pub fn response(&self) -> BatchResponse {
        BatchResponse {
            batch_item_failures: self
                .failed
                .iter()
                .map(|failed| BatchItemFailure {
                    item_identifier: failed.message_id.clone(),
                })
                .collect(),
        }
    }
}

/// Partial batch response listing records to redeliver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}
