use thiserror::Error;

/// Why a single queue record ended up unacknowledged
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Transport wrapper or inner message could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The realtime endpoint did not accept the message.
    /// Only reported when failed deliveries are redelivered.
    #[error("Delivery failed for record {0}")]
    DeliveryFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Delivery,
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::ParseError(_) => ErrorKind::Parse,
            RecordError::DeliveryFailed(_) => ErrorKind::Delivery,
        }
    }
}

/// Failure of a whole batch invocation, before any record is looked at
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Malformed batch event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}
