use async_trait::async_trait;
use serde::Serialize;

/// Parameters of a push to one live client connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub user_id: String,
    pub connection_id: String,
    /// Opaque message body, forwarded as-is
    pub body: String,
}

/// Trait for pushing messages to the realtime endpoint
///
/// Implementations never fail towards the caller: a rejected request or a
/// transport failure is logged by the implementation and collapses to `None`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Returns the endpoint's response payload, or `None` when delivery failed
    async fn send_to_connection(&self, request: &DeliveryRequest) -> Option<serde_json::Value>;
}
