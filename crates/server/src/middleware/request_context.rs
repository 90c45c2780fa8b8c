use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use grok_bridge_core::context::RequestContext;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that injects a `RequestContext` as an axum Extension and echoes
/// its id back as `x-request-id`.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let client_ip = client_ip(&request);

    let ctx = RequestContext::new(client_ip);
    let request_id = ctx.request_id.clone();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then the socket peer when
/// the server was started with connect info.
fn client_ip(request: &Request) -> Option<String> {
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| {
            request
                .extensions()
                .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
}
