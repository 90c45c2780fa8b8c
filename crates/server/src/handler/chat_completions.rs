use crate::AppState;
use crate::auth::extract_credentials;
use crate::dispatch::{DispatchRequest, dispatch};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use bytes::Bytes;
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::types::openai::ChatCompletionRequest;
use grok_bridge_translator::extract_messages;

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ProxyError> {
    // Body, then credentials, then messages.
    let req: ChatCompletionRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Failed to parse request body: {e}");
        ProxyError::BadRequest("Invalid request body".into())
    })?;
    let credentials = extract_credentials(&headers)?;
    let messages = extract_messages(&req)?;

    dispatch(
        &state,
        DispatchRequest {
            credentials,
            model: req.model,
            stream: req.stream.unwrap_or(false),
            conversation_id: req.conversation_id,
            messages,
        },
    )
    .await
}
