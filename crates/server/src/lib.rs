pub mod auth;
pub mod dispatch;
pub mod handler;
pub mod middleware;
pub mod streaming;

use arc_swap::ArcSwap;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware as axum_mw};
use grok_bridge_core::config::Config;
use grok_bridge_core::conversation::ConversationStore;
use grok_bridge_core::provider::UpstreamExecutor;
use grok_bridge_core::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<Config>>,
    pub conversations: Arc<dyn ConversationStore>,
    pub upstream: Arc<dyn UpstreamExecutor>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Any origin; every `OPTIONS` request is answered here with the allowed
/// methods and headers and an empty body.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(CORS_MAX_AGE)
}

pub fn build_router(state: AppState) -> Router {
    let body_limit_bytes = state.config.load().body_limit_mb * 1024 * 1024;

    // Public routes
    let public_routes = Router::new().route("/health", get(handler::health::health));

    // API routes, rate limited, with body size limit
    let api_routes = Router::new()
        .route(
            "/v1/models",
            get(handler::models::list_models),
        )
        .route(
            "/v1/chat/completions",
            post(handler::chat_completions::chat_completions),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ));

    // Compose, then global middleware layers (outer → inner)
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(axum_mw::from_fn(
            middleware::request_logging::request_logging_middleware,
        ))
        .layer(axum_mw::from_fn(
            middleware::request_context::request_context_middleware,
        ))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
