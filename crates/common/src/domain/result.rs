use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed ingestion request. Fatal to that request, never retried.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The pub/sub layer rejected or could not accept the envelope.
    #[error("Publish error: {0}")]
    PublishError(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl DomainError {
    /// Whether the same request could succeed if it were attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::PublishError(_))
    }
}
