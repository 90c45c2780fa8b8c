use crate::links::rewrite_tweet_links;
use crate::thinking::{CLOSE_MARKER, Emission, OPEN_MARKER, ThinkingState};
use grok_bridge_core::chat_id;
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::provider::UpstreamResponse;
use grok_bridge_core::types::grok::{GrokEvent, Sender};
use grok_bridge_core::types::openai::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
use serde_json::Value;

/// Identity repeated on every chunk of one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl ChunkMeta {
    /// Derive chunk identity from the upstream turn id and `date` header,
    /// falling back to the local clock for either.
    pub fn new(turn_id: Option<&str>, date: Option<&str>, model: &str) -> Self {
        let now = chrono::Utc::now();
        let created = date
            .and_then(|d| chrono::DateTime::parse_from_rfc2822(d).ok())
            .map(|d| d.timestamp())
            .unwrap_or_else(|| now.timestamp());
        let id = match turn_id.map(str::trim).filter(|t| !t.is_empty()) {
            Some(turn) => chat_id::encode(turn),
            None => chat_id::encode(&now.timestamp_millis().to_string()),
        };
        Self {
            id,
            created,
            model: model.to_string(),
        }
    }

    pub fn from_upstream(resp: &UpstreamResponse, model: &str) -> Self {
        Self::new(resp.header("userChatItemId"), resp.header("date"), model)
    }

    pub fn chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                logprobs: None,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }
}

/// One client-facing SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Chunk(ChatCompletionChunk),
    Error(Value),
    Done,
}

impl Frame {
    /// Error frame for a failure while establishing or reading the upstream call.
    pub fn upstream_error(err: &ProxyError) -> Self {
        Self::Error(err.to_body_with_message(&format!("Grok API request failed: {err}")))
    }

    /// Payload for the SSE `data:` field.
    pub fn data(&self) -> String {
        match self {
            Self::Chunk(chunk) => serde_json::to_string(chunk).unwrap_or_default(),
            Self::Error(body) => body.to_string(),
            Self::Done => "[DONE]".to_string(),
        }
    }
}

/// Converts upstream NDJSON lines into client chunks for one upstream call.
///
/// Exactly one terminal `finish_reason: "stop"` chunk is produced, from a
/// soft-stop event or from [`StreamTranslator::finish`]. Events after the
/// terminal chunk are ignored.
#[derive(Debug)]
pub struct StreamTranslator {
    meta: ChunkMeta,
    state: ThinkingState,
    /// Role most recently attached to a content chunk.
    announced: Option<Sender>,
    reply: String,
    finished: bool,
}

impl StreamTranslator {
    pub fn new(meta: ChunkMeta) -> Self {
        Self {
            meta,
            state: ThinkingState::default(),
            announced: None,
            reply: String::new(),
            finished: false,
        }
    }

    pub fn meta(&self) -> &ChunkMeta {
        &self.meta
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Assistant content accumulated so far, excluding reasoning.
    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Translate one complete upstream line. Unparseable lines are skipped.
    pub fn push_line(&mut self, line: &str) -> Vec<ChatCompletionChunk> {
        if self.finished {
            tracing::debug!("Ignoring upstream event after stop");
            return Vec::new();
        }

        let event: GrokEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Could not parse upstream line: {e}; line: {line}");
                return Vec::new();
            }
        };

        let mut chunks = Vec::new();
        if let Some(fragment) = event.fragment() {
            let text = rewrite_tweet_links(fragment.text);
            let (next, emissions) = self
                .state
                .on_fragment(fragment.sender, &text, fragment.thinking);
            self.state = next;
            for emission in emissions {
                chunks.push(self.render(emission));
            }
        }

        if event.is_soft_stop() {
            chunks.extend(self.stop());
        }
        chunks
    }

    /// Close out the call after the upstream body ends. Returns any trailing
    /// chunks and the assistant reply to store in history.
    pub fn finish(mut self) -> (Vec<ChatCompletionChunk>, String) {
        let chunks = if self.finished {
            Vec::new()
        } else {
            tracing::debug!("Upstream ended without soft stop");
            self.stop()
        };
        (chunks, self.reply)
    }

    fn stop(&mut self) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::with_capacity(2);
        let (next, close) = self.state.close();
        self.state = next;
        if let Some(close) = close {
            chunks.push(self.render(close));
        }
        chunks.push(self.meta.chunk(ChunkDelta::default(), Some("stop")));
        self.finished = true;
        chunks
    }

    fn render(&mut self, emission: Emission) -> ChatCompletionChunk {
        let delta = match emission {
            Emission::OpenThinking => content_delta(OPEN_MARKER.to_string()),
            Emission::CloseThinking => content_delta(CLOSE_MARKER.to_string()),
            Emission::Thinking(text) => content_delta(text),
            Emission::Content { sender, text } => {
                if sender == Sender::Assistant {
                    self.reply.push_str(&text);
                }
                let role = (self.announced != Some(sender)).then(|| {
                    self.announced = Some(sender);
                    sender.role().to_string()
                });
                ChunkDelta {
                    role,
                    content: Some(text),
                }
            }
        };
        self.meta.chunk(delta, None)
    }
}

fn content_delta(text: String) -> ChunkDelta {
    ChunkDelta {
        role: None,
        content: Some(text),
    }
}
