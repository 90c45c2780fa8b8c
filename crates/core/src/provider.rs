use crate::error::ProxyError;
use crate::types::grok::GrokRequest;
use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

/// Credential pair carried in `Authorization: Bearer <bearer>,<token>`.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredentials {
    pub bearer: String,
    /// Session token, sent upstream as the `auth_token` cookie.
    pub token: String,
}

impl fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("bearer", &"***")
            .field("token", &"***")
            .finish()
    }
}

/// Complete lines of the upstream NDJSON body, in arrival order.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ProxyError>> + Send>>;

/// An established upstream response whose body has not been consumed yet.
pub struct UpstreamResponse {
    /// Response headers with lower-cased names.
    pub headers: HashMap<String, String>,
    pub lines: LineStream,
}

impl UpstreamResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Performs the outbound chat call.
#[async_trait]
pub trait UpstreamExecutor: Send + Sync {
    fn identifier(&self) -> &str;

    /// Send the request, retrying transient failures. Resolves once a
    /// successful status and headers are received; non-success statuses
    /// become [`ProxyError::Upstream`].
    async fn execute(
        &self,
        credentials: &UpstreamCredentials,
        request: &GrokRequest,
    ) -> Result<UpstreamResponse, ProxyError>;
}
