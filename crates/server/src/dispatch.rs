use crate::AppState;
use crate::streaming::build_sse_response;
use axum::Json;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use grok_bridge_core::conversation::{ConversationStore, Message};
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::provider::{UpstreamCredentials, UpstreamExecutor};
use grok_bridge_core::types::grok::GrokRequest;
use grok_bridge_translator::aggregate::build_response;
use grok_bridge_translator::{Aggregator, ChunkMeta, Frame, StreamTranslator, build_grok_request};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

/// A validated chat request, ready to be sent upstream.
pub struct DispatchRequest {
    pub credentials: UpstreamCredentials,
    /// Client-requested model name; only selects upstream flags.
    pub model: Option<String>,
    pub stream: bool,
    pub conversation_id: Option<String>,
    /// Messages submitted with this request, appended to the conversation.
    pub messages: Vec<Message>,
}

/// Record the submitted messages, build the upstream payload from the whole
/// conversation and answer either as an SSE stream or a single JSON object.
pub async fn dispatch(state: &AppState, req: DispatchRequest) -> Result<Response, ProxyError> {
    let config = state.config.load_full();

    let conversation_id = req
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().to_string());

    state.conversations.get_or_create(&conversation_id);
    let history = state.conversations.append(&conversation_id, &req.messages);
    let grok_request = build_grok_request(
        req.model.as_deref(),
        &history,
        &config.upstream.default_model,
    );

    tracing::debug!(
        conversation_id = %conversation_id,
        upstream = state.upstream.identifier(),
        stream = req.stream,
        turns = grok_request.responses.len(),
        "Dispatching chat request"
    );

    let mut response = if req.stream {
        let (tx, rx) = mpsc::channel(config.streaming.channel_capacity);
        tokio::spawn(run_stream(
            state.upstream.clone(),
            state.conversations.clone(),
            req.credentials,
            grok_request,
            conversation_id.clone(),
            tx,
        ));
        let mut resp =
            build_sse_response(ReceiverStream::new(rx), config.streaming.keepalive_seconds)
                .into_response();
        resp.headers_mut()
            .insert("x-accel-buffering", HeaderValue::from_static("no"));
        resp
    } else {
        complete(state, &req.credentials, &grok_request, &conversation_id).await?
    };

    if let Ok(value) = HeaderValue::from_str(&conversation_id) {
        response.headers_mut().insert(CONVERSATION_ID_HEADER, value);
    }
    Ok(response)
}

/// Non-streaming path: collect the whole upstream reply into one response.
async fn complete(
    state: &AppState,
    credentials: &UpstreamCredentials,
    request: &GrokRequest,
    conversation_id: &str,
) -> Result<Response, ProxyError> {
    let upstream = state.upstream.execute(credentials, request).await?;
    let meta = ChunkMeta::from_upstream(&upstream, &request.grok_model_option_id);

    let mut aggregator = Aggregator::new();
    let mut lines = upstream.lines;
    while let Some(line) = lines.next().await {
        aggregator.push_line(&line?);
        if aggregator.is_finished() {
            break;
        }
    }

    let reply = aggregator.into_reply();
    state
        .conversations
        .append(conversation_id, &[Message::assistant(reply.clone())]);

    let prompt = serde_json::to_string(request)?;
    Ok(Json(build_response(&meta, reply, &prompt)).into_response())
}

/// Streaming task. Owns the frame sender, so the client body ends exactly
/// when this task returns.
async fn run_stream(
    upstream: Arc<dyn UpstreamExecutor>,
    conversations: Arc<dyn ConversationStore>,
    credentials: UpstreamCredentials,
    request: GrokRequest,
    conversation_id: String,
    tx: mpsc::Sender<Frame>,
) {
    match pump(upstream.as_ref(), &credentials, &request, &tx).await {
        Ok(Some(reply)) => {
            if reply.is_empty() {
                tracing::debug!(conversation_id = %conversation_id, "No assistant content to store");
            } else {
                conversations.append(&conversation_id, &[Message::assistant(reply)]);
            }
        }
        Ok(None) => {
            tracing::debug!(conversation_id = %conversation_id, "Client disconnected, upstream dropped");
            return;
        }
        Err(e) => {
            tracing::error!(conversation_id = %conversation_id, "Upstream stream failed: {e}");
            if tx.send(Frame::upstream_error(&e)).await.is_err() {
                return;
            }
        }
    }
    let _ = tx.send(Frame::Done).await;
}

/// Drive one upstream call into client frames. Returns the assistant reply,
/// or `None` once the client has gone away.
async fn pump(
    upstream: &dyn UpstreamExecutor,
    credentials: &UpstreamCredentials,
    request: &GrokRequest,
    tx: &mpsc::Sender<Frame>,
) -> Result<Option<String>, ProxyError> {
    let response = tokio::select! {
        biased;
        _ = tx.closed() => return Ok(None),
        resp = upstream.execute(credentials, request) => resp?,
    };

    let mut translator = StreamTranslator::new(ChunkMeta::from_upstream(
        &response,
        &request.grok_model_option_id,
    ));
    let mut lines = response.lines;

    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => return Ok(None),
            next = lines.next() => next,
        };
        let Some(line) = next else {
            break;
        };
        for chunk in translator.push_line(&line?) {
            if tx.send(Frame::Chunk(chunk)).await.is_err() {
                return Ok(None);
            }
        }
        if translator.is_finished() {
            break;
        }
    }

    let (tail, reply) = translator.finish();
    for chunk in tail {
        if tx.send(Frame::Chunk(chunk)).await.is_err() {
            return Ok(None);
        }
    }
    Ok(Some(reply))
}
