use crate::ndjson::parse_ndjson_stream;
use crate::retry::{RetryPolicy, fetch_with_retry};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use grok_bridge_core::config::Config;
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::provider::*;
use grok_bridge_core::types::grok::GrokRequest;
use std::sync::Arc;

/// Executor for the Grok `add_response` endpoint.
pub struct GrokExecutor {
    config: Arc<ArcSwap<Config>>,
}

impl GrokExecutor {
    pub fn new(config: Arc<ArcSwap<Config>>) -> Self {
        Self { config }
    }

    /// Build a POST request with the bearer header and session cookie.
    fn build_request(
        &self,
        config: &Config,
        credentials: &UpstreamCredentials,
        request: &GrokRequest,
    ) -> Result<reqwest::RequestBuilder, ProxyError> {
        let client = grok_bridge_core::proxy::build_http_client(
            config.proxy_url.as_deref(),
            config.upstream.connect_timeout_secs,
        )
        .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {e}")))?;

        let body = serde_json::to_vec(request)?;
        Ok(client
            .post(&config.upstream.url)
            .header("authorization", format!("Bearer {}", credentials.bearer))
            .header("content-type", "application/json; charset=UTF-8")
            .header("cookie", format!("auth_token={}", credentials.token))
            .body(body))
    }
}

#[async_trait]
impl UpstreamExecutor for GrokExecutor {
    fn identifier(&self) -> &str {
        "grok"
    }

    async fn execute(
        &self,
        credentials: &UpstreamCredentials,
        request: &GrokRequest,
    ) -> Result<UpstreamResponse, ProxyError> {
        let config = self.config.load();
        let req = self.build_request(&config, credentials, request)?;
        let policy = RetryPolicy::from(&config.retry);

        tracing::debug!(
            model = %request.grok_model_option_id,
            turns = request.responses.len(),
            reasoning = request.is_reasoning,
            deepsearch = request.is_deepsearch,
            "Sending upstream request"
        );

        let resp = fetch_with_retry(req, &policy).await?;
        let status = resp.status().as_u16();
        let headers = crate::extract_headers(&resp);

        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProxyError::Upstream { status, body });
        }

        Ok(UpstreamResponse {
            headers,
            lines: parse_ndjson_stream(resp.bytes_stream()),
        })
    }
}
