use crate::realtime::{RequestSigner, parse_region};
use anyhow::Context;
use async_trait::async_trait;
use common::domain::{DeliveryClient, DeliveryRequest};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// GraphQL mutation pushing a message to one client connection
pub const SEND_MESSAGE_MUTATION: &str = "mutation sendMessageToClient($userId: String!, $connectionId: String!, $body: String!) { sendMessageToClient(userId: $userId, connectionId: $connectionId, body: $body) { userId connectionId body } }";

/// Service name the request is signed for
pub const SIGNING_SERVICE: &str = "appsync";

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: &'a DeliveryRequest,
}

#[derive(Debug, Clone)]
pub struct RealtimeClientConfig {
    pub endpoint_url: String,
    pub default_region: String,
    pub timeout: Duration,
}

/// Why a delivery produced no result
#[derive(Error, Debug)]
pub enum DeliveryFailure {
    /// The endpoint answered with an `errors` entry
    #[error("endpoint rejected the request: {0}")]
    Rejected(Value),

    /// Signing, network, timeout or an unreadable response
    #[error("transport failure: {0:#}")]
    Transport(#[from] anyhow::Error),
}

/// Sort a decoded endpoint response into success or rejection
pub fn classify_response(payload: Value) -> Result<Value, DeliveryFailure> {
    match payload.as_object() {
        Some(fields) if fields.contains_key("errors") => Err(DeliveryFailure::Rejected(payload)),
        Some(_) => Ok(payload),
        None => Err(DeliveryFailure::Transport(anyhow::anyhow!(
            "response is not a JSON object: {payload}"
        ))),
    }
}

/// `DeliveryClient` calling the realtime GraphQL endpoint over HTTP
pub struct RealtimeDeliveryClient {
    http: reqwest::Client,
    endpoint_url: String,
    region: String,
    signer: Arc<dyn RequestSigner>,
}

impl RealtimeDeliveryClient {
    pub fn new(config: RealtimeClientConfig, signer: Arc<dyn RequestSigner>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        let region = parse_region(&config.endpoint_url, &config.default_region);
        debug!(endpoint = %config.endpoint_url, region = %region, "initialized realtime delivery client");

        Ok(Self {
            http,
            endpoint_url: config.endpoint_url,
            region,
            signer,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn execute(&self, request: &DeliveryRequest) -> Result<Value, DeliveryFailure> {
        let http_request = self
            .http
            .post(&self.endpoint_url)
            .json(&GraphqlRequest {
                query: SEND_MESSAGE_MUTATION,
                variables: request,
            })
            .build()
            .context("failed to build request")?;

        let signed = self
            .signer
            .sign(http_request, &self.region, SIGNING_SERVICE)
            .await
            .context("failed to sign request")?;

        let response = self
            .http
            .execute(signed)
            .await
            .context("request to realtime endpoint failed")?;

        let payload: Value = response
            .json()
            .await
            .context("realtime endpoint returned a malformed response")?;

        classify_response(payload)
    }
}

#[async_trait]
impl DeliveryClient for RealtimeDeliveryClient {
    #[instrument(skip_all, fields(connection_id = %request.connection_id, user_id = %request.user_id))]
    async fn send_to_connection(&self, request: &DeliveryRequest) -> Option<Value> {
        match self.execute(request).await {
            Ok(payload) => {
                debug!("realtime endpoint accepted message");
                Some(payload)
            }
            Err(DeliveryFailure::Rejected(response)) => {
                error!(
                    request = %request.body,
                    response = %response,
                    "realtime endpoint returned errors"
                );
                None
            }
            Err(failure @ DeliveryFailure::Transport(_)) => {
                error!(request = %request.body, error = %failure, "failed to call realtime endpoint");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{ApiKeySigner, DEFAULT_REGION, MockRequestSigner, UnsignedSigner};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint_url: String) -> RealtimeClientConfig {
        RealtimeClientConfig {
            endpoint_url,
            default_region: DEFAULT_REGION.to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    fn request() -> DeliveryRequest {
        DeliveryRequest {
            user_id: "u1".to_string(),
            connection_id: "c1".to_string(),
            body: r#"{"action":"final_response"}"#.to_string(),
        }
    }

    #[test]
    fn test_classify_response() {
        assert!(classify_response(json!({"data": {"sendMessageToClient": {}}})).is_ok());
        assert!(matches!(
            classify_response(json!({"errors": ["denied"]})),
            Err(DeliveryFailure::Rejected(_))
        ));
        assert!(matches!(
            classify_response(json!(["denied"])),
            Err(DeliveryFailure::Transport(_))
        ));
    }

    #[test]
    fn test_region_derived_from_endpoint() {
        let client = RealtimeDeliveryClient::new(
            config("https://abc.appsync-api.us-east-2.amazonaws.com/graphql".to_string()),
            Arc::new(UnsignedSigner),
        )
        .unwrap();

        assert_eq!(client.region(), "us-east-2");
    }

    #[tokio::test]
    async fn test_successful_delivery_returns_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "query": SEND_MESSAGE_MUTATION,
                "variables": {
                    "userId": "u1",
                    "connectionId": "c1",
                    "body": "{\"action\":\"final_response\"}"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"sendMessageToClient": {"userId": "u1", "connectionId": "c1"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RealtimeDeliveryClient::new(
            config(format!("{}/graphql", server.uri())),
            Arc::new(UnsignedSigner),
        )
        .unwrap();

        let payload = client.send_to_connection(&request()).await.unwrap();
        assert_eq!(payload["data"]["sendMessageToClient"]["connectionId"], "c1");
    }

    #[tokio::test]
    async fn test_errors_in_response_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": ["denied"]})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            RealtimeDeliveryClient::new(config(server.uri()), Arc::new(UnsignedSigner)).unwrap();

        assert!(client.send_to_connection(&request()).await.is_none());
    }

    #[tokio::test]
    async fn test_non_json_response_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client =
            RealtimeDeliveryClient::new(config(server.uri()), Arc::new(UnsignedSigner)).unwrap();

        assert!(client.send_to_connection(&request()).await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = RealtimeDeliveryClient::new(
            RealtimeClientConfig {
                timeout: Duration::from_millis(50),
                ..config(server.uri())
            },
            Arc::new(UnsignedSigner),
        )
        .unwrap();

        assert!(client.send_to_connection(&request()).await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_none() {
        // nothing listens on the discard port
        let client = RealtimeDeliveryClient::new(
            config("http://127.0.0.1:9/graphql".to_string()),
            Arc::new(UnsignedSigner),
        )
        .unwrap();

        assert!(client.send_to_connection(&request()).await.is_none());
    }

    #[tokio::test]
    async fn test_api_key_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "da2-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RealtimeDeliveryClient::new(
            config(server.uri()),
            Arc::new(ApiKeySigner::new("da2-secret")),
        )
        .unwrap();

        assert!(client.send_to_connection(&request()).await.is_some());
    }

    #[tokio::test]
    async fn test_signer_receives_region_and_service() {
        let mut signer = MockRequestSigner::new();
        signer
            .expect_sign()
            .withf(|_request, region: &str, service: &str| {
                region == "eu-central-1" && service == "appsync"
            })
            .times(1)
            .returning(|request, _, _| Ok(request));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;

        let client = RealtimeDeliveryClient::new(config(server.uri()), Arc::new(signer)).unwrap();

        assert!(client.send_to_connection(&request()).await.is_some());
    }

    #[tokio::test]
    async fn test_signer_failure_yields_none_without_sending() {
        let mut signer = MockRequestSigner::new();
        signer
            .expect_sign()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("credentials expired")));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(0)
            .mount(&server)
            .await;

        let client = RealtimeDeliveryClient::new(config(server.uri()), Arc::new(signer)).unwrap();

        assert!(client.send_to_connection(&request()).await.is_none());
    }
}
