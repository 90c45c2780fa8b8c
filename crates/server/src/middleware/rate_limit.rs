use crate::AppState;
use crate::auth::bearer_key;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::{extract::State, http::Request, middleware::Next, response::Response};
use grok_bridge_core::context::RequestContext;
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::rate_limit::RateLimitInfo;

/// Per-client request limit. Clients are keyed by their bearer credential,
/// falling back to the client IP.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !state.rate_limiter.is_enabled() {
        return next.run(request).await;
    }

    let key = bearer_key(request.headers())
        .map(|b| format!("bearer:{b}"))
        .or_else(|| {
            request
                .extensions()
                .get::<RequestContext>()
                .and_then(|c| c.client_ip.clone())
                .map(|ip| format!("ip:{ip}"))
        })
        .unwrap_or_else(|| "anonymous".to_string());

    let info = state.rate_limiter.check(&key);
    let mut response = if info.allowed {
        next.run(request).await
    } else {
        tracing::warn!(reset_secs = info.reset_secs, "Rate limit exceeded");
        ProxyError::RateLimited {
            reset_secs: info.reset_secs,
        }
        .into_response()
    };

    insert_headers(&mut response, &info);
    response
}

fn insert_headers(response: &mut Response, info: &RateLimitInfo) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(info.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset_secs));
}
