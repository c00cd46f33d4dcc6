use crate::domain::RecordError;
use common::domain::{DeliveryRequest, MessageEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of a delivery batch.
///
/// `body` holds a serialized [`TransportWrapper`] whose `Message` is in turn a
/// serialized envelope. Unknown fields of the queue's record format are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub message_id: String,
    pub body: String,
}

impl QueueRecord {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
        }
    }

    /// Record whose body is the given wrapper
    pub fn from_wrapper(
        message_id: impl Into<String>,
        wrapper: &TransportWrapper,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(message_id, serde_json::to_string(wrapper)?))
    }
}

/// Fan-out notification framing around a serialized envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportWrapper {
    #[serde(rename = "Message")]
    pub message: String,
}

impl TransportWrapper {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn wrap(envelope: &MessageEnvelope) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::to_string(envelope)?))
    }
}

/// Addressing and body extracted from a queue record
#[derive(Debug, Clone, PartialEq)]
pub struct UnwrappedMessage {
    pub user_id: String,
    pub connection_id: String,
    /// The inner message exactly as it was carried by the wrapper
    pub body: String,
}

impl From<UnwrappedMessage> for DeliveryRequest {
    fn from(message: UnwrappedMessage) -> Self {
        DeliveryRequest {
            user_id: message.user_id,
            connection_id: message.connection_id,
            body: message.body,
        }
    }
}

/// Peel both encoding layers off a record
pub fn unwrap_record(record: &QueueRecord) -> Result<UnwrappedMessage, RecordError> {
    let wrapper: TransportWrapper = serde_json::from_str(&record.body)
        .map_err(|e| RecordError::ParseError(format!("transport wrapper: {e}")))?;

    let message: Value = serde_json::from_str(&wrapper.message)
        .map_err(|e| RecordError::ParseError(format!("message: {e}")))?;

    let user_id = string_field(&message, "userId")?;
    let connection_id = string_field(&message, "connectionId")?;

    Ok(UnwrappedMessage {
        user_id,
        connection_id,
        body: wrapper.message,
    })
}

fn string_field(message: &Value, key: &str) -> Result<String, RecordError> {
    let fields = message
        .as_object()
        .ok_or_else(|| RecordError::ParseError("message is not a JSON object".to_string()))?;

    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RecordError::ParseError(format!("message has no string field `{key}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::Direction;
    use serde_json::json;

    fn outbound_envelope() -> MessageEnvelope {
        MessageEnvelope {
            action: "final_response".to_string(),
            model_interface: "langchain".to_string(),
            direction: Direction::Out,
            connection_id: "c1".to_string(),
            timestamp: "1700000001".to_string(),
            user_id: "u1".to_string(),
            data: json!({"content": "hello"}),
        }
    }

    #[test]
    fn test_wrapped_envelope_unwraps_to_same_addressing_and_body() {
        let envelope = outbound_envelope();
        let wrapper = TransportWrapper::wrap(&envelope).unwrap();
        let record = QueueRecord::from_wrapper("m1", &wrapper).unwrap();

        let unwrapped = unwrap_record(&record).unwrap();

        assert_eq!(unwrapped.user_id, envelope.user_id);
        assert_eq!(unwrapped.connection_id, envelope.connection_id);
        assert_eq!(unwrapped.body, serde_json::to_string(&envelope).unwrap());
    }

    #[test]
    fn test_wrapper_uses_capitalized_message_key() {
        let wrapper = TransportWrapper::new("{}");
        assert_eq!(serde_json::to_value(&wrapper).unwrap(), json!({"Message": "{}"}));
    }

    #[test]
    fn test_queue_record_ignores_extra_fields() {
        let record: QueueRecord = serde_json::from_value(json!({
            "messageId": "m1",
            "receiptHandle": "abc",
            "body": "{\"Message\":\"{}\"}",
            "attributes": {"ApproximateReceiveCount": "1"}
        }))
        .unwrap();

        assert_eq!(record.message_id, "m1");
    }

    #[test]
    fn test_outer_layer_not_json() {
        let record = QueueRecord::new("m1", "not-json");
        let err = unwrap_record(&record).unwrap_err();
        assert!(err.to_string().contains("transport wrapper"));
    }

    #[test]
    fn test_outer_layer_without_message_key() {
        let record = QueueRecord::new("m1", r#"{"Subject":"x"}"#);
        assert!(matches!(unwrap_record(&record), Err(RecordError::ParseError(_))));
    }

    #[test]
    fn test_inner_layer_not_json() {
        let record = QueueRecord::from_wrapper("m1", &TransportWrapper::new("not-json")).unwrap();
        let err = unwrap_record(&record).unwrap_err();
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn test_inner_layer_missing_user_id() {
        let record = QueueRecord::from_wrapper(
            "m1",
            &TransportWrapper::new(r#"{"connectionId":"c1","data":{}}"#),
        )
        .unwrap();

        match unwrap_record(&record) {
            Err(RecordError::ParseError(msg)) => assert!(msg.contains("userId")),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_inner_layer_not_an_object() {
        let record = QueueRecord::from_wrapper("m1", &TransportWrapper::new("[1,2]")).unwrap();
        assert!(matches!(unwrap_record(&record), Err(RecordError::ParseError(_))));
    }

    #[test]
    fn test_unwrapped_message_becomes_delivery_request() {
        let request: DeliveryRequest = UnwrappedMessage {
            user_id: "u1".to_string(),
            connection_id: "c1".to_string(),
            body: "{}".to_string(),
        }
        .into();

        assert_eq!(request.connection_id, "c1");
        assert_eq!(request.body, "{}");
    }
}
