use chrono::{DateTime, Utc};
use common::domain::{Direction, DomainError, DomainResult, MessageEnvelope};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Values filled in when the client leaves them out
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeDefaults {
    pub model_interface: String,
}

impl Default for EnvelopeDefaults {
    fn default() -> Self {
        Self {
            model_interface: "langchain".to_string(),
        }
    }
}

/// Request handed over by the connection gateway.
///
/// `body` is the raw message text the client sent, expected to hold a JSON
/// object with `action`, and optionally `modelInterface` and `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    #[garde(length(min = 1))]
    pub connection_id: String,
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(skip)]
    pub body: String,
}

/// Decoded client message body
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub action: String,
    #[serde(default)]
    pub model_interface: Option<String>,
    #[serde(default = "empty_data")]
    pub data: Value,
}

fn empty_data() -> Value {
    Value::Object(Default::default())
}

impl ChatRequestBody {
    pub fn parse(body: &str) -> DomainResult<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| DomainError::ValidationError(format!("body is not valid JSON: {e}")))?;

        if !value.is_object() {
            return Err(DomainError::ValidationError(
                "body must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| DomainError::ValidationError(format!("body: {e}")))
    }
}

/// Turns ingestion requests into inbound envelopes
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    defaults: EnvelopeDefaults,
}

impl EnvelopeBuilder {
    pub fn new(defaults: EnvelopeDefaults) -> Self {
        Self { defaults }
    }

    pub fn build(&self, request: &IngestionRequest) -> DomainResult<MessageEnvelope> {
        self.build_at(request, Utc::now())
    }

    /// Same as [`build`](Self::build) with a fixed clock
    pub fn build_at(
        &self,
        request: &IngestionRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<MessageEnvelope> {
        let body = ChatRequestBody::parse(&request.body)?;

        Ok(MessageEnvelope {
            action: body.action,
            model_interface: body
                .model_interface
                .unwrap_or_else(|| self.defaults.model_interface.clone()),
            direction: Direction::In,
            connection_id: request.connection_id.clone(),
            timestamp: unix_seconds(now).to_string(),
            user_id: request.user_id.clone(),
            data: body.data,
        })
    }
}

/// Unix time rounded to the nearest whole second
fn unix_seconds(now: DateTime<Utc>) -> i64 {
    (now.timestamp_millis() + 500).div_euclid(1000)
}
