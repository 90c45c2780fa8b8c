//! Bounded retries with exponential backoff around a single outbound request.

use grok_bridge_core::config::RetryConfig;
use grok_bridge_core::error::ProxyError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_factor: cfg.backoff_factor,
            base_delay: cfg.base_delay(),
            attempt_timeout: cfg.attempt_timeout(),
            retry_statuses: cfg.retry_statuses.clone(),
        }
    }
}

impl RetryPolicy {
    /// Wait after the 0-based `attempt` failed: `base * factor^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.backoff_factor.saturating_pow(attempt))
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

enum Attempt {
    Done(reqwest::Response),
    Retry(ProxyError),
}

/// Send `request`, retrying timeouts, transport errors and retryable statuses.
///
/// Success and non-retryable statuses are returned untouched; the caller
/// decides what an error status means. The timeout covers one attempt up to
/// the response headers, never the body that follows.
pub async fn fetch_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, ProxyError> {
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        let Some(req) = request.try_clone() else {
            return Err(ProxyError::Internal(
                "request body cannot be replayed for retries".into(),
            ));
        };
        tracing::debug!("Fetch attempt {}/{}", attempt + 1, policy.max_attempts);

        let outcome = match tokio::time::timeout(policy.attempt_timeout, send_once(req, policy)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Attempt::Retry(ProxyError::Network(format!(
                "request timed out after {}s",
                policy.attempt_timeout.as_secs_f64()
            ))),
        };

        match outcome {
            Attempt::Done(resp) => return Ok(resp),
            Attempt::Retry(e) => {
                tracing::warn!(
                    "Upstream attempt {}/{} failed: {e}",
                    attempt + 1,
                    policy.max_attempts
                );
                last_error = Some(e);
            }
        }

        if attempt + 1 < policy.max_attempts {
            let wait = policy.backoff(attempt);
            tracing::info!("Retrying in {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }

    Err(last_error
        .unwrap_or_else(|| ProxyError::Internal("request failed after retries".into())))
}

async fn send_once(req: reqwest::RequestBuilder, policy: &RetryPolicy) -> Attempt {
    let resp = match req.send().await {
        Ok(resp) => resp,
        Err(e) => return Attempt::Retry(e.into()),
    };

    let status = resp.status();
    tracing::debug!("Upstream responded with {status}");
    if status.is_success() || !policy.is_retryable(status.as_u16()) {
        return Attempt::Done(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Attempt::Retry(ProxyError::Upstream {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Clone)]
    struct Script {
        statuses: Arc<Vec<u16>>,
        hits: Arc<AtomicUsize>,
        slow_first: bool,
    }

    async fn scripted(State(script): State<Script>) -> (StatusCode, String) {
        let n = script.hits.fetch_add(1, Ordering::SeqCst);
        if script.slow_first && n == 0 {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        let code = script.statuses[n.min(script.statuses.len() - 1)];
        (StatusCode::from_u16(code).unwrap(), format!("attempt {n} status {code}"))
    }

    async fn serve(statuses: Vec<u16>, slow_first: bool) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Script {
            statuses: Arc::new(statuses),
            hits: hits.clone(),
            slow_first,
        };
        let app = axum::Router::new()
            .route("/chat", post(scripted))
            .with_state(script);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/chat"), hits)
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_factor: 2,
            base_delay: Duration::from_millis(20),
            attempt_timeout: Duration::from_secs(5),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.is_retryable(503));
        assert!(!policy.is_retryable(404));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let (url, hits) = serve(vec![503, 503, 200], false).await;
        let client = reqwest::Client::new();
        let started = Instant::now();

        let resp = fetch_with_retry(client.post(&url).body("{}"), &fast_policy(5))
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        // 20ms after the first failure, 40ms after the second.
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_status() {
        let (url, hits) = serve(vec![502, 503], false).await;
        let client = reqwest::Client::new();

        let err = fetch_with_retry(client.post(&url).body("{}"), &fast_policy(3))
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        match &err {
            ProxyError::Upstream { status, body } => {
                assert_eq!(*status, 503);
                assert_eq!(body, "attempt 2 status 503");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_non_retryable_status_is_returned_immediately() {
        let (url, hits) = serve(vec![401, 200], false).await;
        let client = reqwest::Client::new();

        let resp = fetch_with_retry(client.post(&url).body("{}"), &fast_policy(5))
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let (url, hits) = serve(vec![200], true).await;
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(100),
            ..fast_policy(3)
        };

        let resp = fetch_with_retry(client.post(&url).body("{}"), &policy)
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_exhausts_attempts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = reqwest::Client::new();

        let err = fetch_with_retry(
            client.post(format!("http://{addr}/chat")).body("{}"),
            &fast_policy(2),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProxyError::Network(_)));
    }
}
