use anyhow::Context;
use async_trait::async_trait;
use reqwest::Request;
use reqwest::header::HeaderValue;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticates an outgoing realtime request.
///
/// Receives the fully built request together with the signing region and
/// service, and returns the request to send. A failure is treated by the
/// caller like any other transport failure.
///
/// Neither built-in signer uses `region` or `service`. Endpoints that require
/// SigV4 get an implementation of this trait wrapping the credential provider,
/// and the client hands it the region derived from the endpoint host and
/// [`SIGNING_SERVICE`](crate::realtime::SIGNING_SERVICE).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign(&self, request: Request, region: &str, service: &str) -> anyhow::Result<Request>;
}

/// Sends the request as built, for endpoints open on a private network
#[derive(Debug, Clone, Default)]
pub struct UnsignedSigner;

#[async_trait]
impl RequestSigner for UnsignedSigner {
    async fn sign(&self, request: Request, _region: &str, _service: &str) -> anyhow::Result<Request> {
        Ok(request)
    }
}

/// Adds a static API key header. The key is not scoped to a region.
#[derive(Clone)]
pub struct ApiKeySigner {
    api_key: String,
}

impl ApiKeySigner {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySigner").field("api_key", &"<redacted>").finish()
    }
}

#[async_trait]
impl RequestSigner for ApiKeySigner {
    async fn sign(
        &self,
        mut request: Request,
        _region: &str,
        _service: &str,
    ) -> anyhow::Result<Request> {
        let mut value =
            HeaderValue::from_str(&self.api_key).context("API key is not a valid header value")?;
        value.set_sensitive(true);

        request.headers_mut().insert(API_KEY_HEADER, value);
        Ok(request)
    }
}
