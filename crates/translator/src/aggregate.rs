use crate::links::rewrite_tweet_links;
use crate::stream::ChunkMeta;
use grok_bridge_core::types::grok::{GrokEvent, Sender};
use grok_bridge_core::types::openai::{ChatCompletionResponse, Choice, ResponseMessage, Usage};

/// Returned as the assistant reply when upstream produced no usable content.
pub const FALLBACK_REPLY: &str = "I'm sorry, I wasn't able to generate a response.";

const CHARS_PER_TOKEN: usize = 4;

/// Collects a whole upstream response into one reply.
///
/// Only assistant, non-reasoning fragments count. Events after a soft stop
/// are ignored.
#[derive(Debug, Default)]
pub struct Aggregator {
    reply: String,
    finished: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        let event: GrokEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Could not parse upstream line: {e}; line: {line}");
                return;
            }
        };

        if let Some(fragment) = event.fragment()
            && fragment.sender == Sender::Assistant
            && !fragment.thinking
        {
            self.reply.push_str(&rewrite_tweet_links(fragment.text));
        }
        if event.is_soft_stop() {
            self.finished = true;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The collected reply, or [`FALLBACK_REPLY`] when nothing was produced.
    pub fn into_reply(self) -> String {
        if self.reply.is_empty() {
            tracing::warn!("Upstream produced no assistant content");
            FALLBACK_REPLY.to_string()
        } else {
            self.reply
        }
    }
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Build the non-streaming response. `prompt` is the serialized upstream
/// payload, used only for the usage estimate.
pub fn build_response(meta: &ChunkMeta, reply: String, prompt: &str) -> ChatCompletionResponse {
    let prompt_tokens = estimate_tokens(prompt);
    let completion_tokens = estimate_tokens(&reply);
    ChatCompletionResponse {
        id: meta.id.clone(),
        object: "chat.completion".to_string(),
        created: meta.created,
        model: meta.model.clone(),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: reply,
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn aggregate(lines: &[serde_json::Value]) -> String {
        let mut agg = Aggregator::new();
        for line in lines {
            agg.push_line(&line.to_string());
        }
        agg.into_reply()
    }

    #[test]
    fn test_only_assistant_normal_content_is_kept() {
        let reply = aggregate(&[
            json!({"result": {"sender": "ASSISTANT", "message": "plan", "isThinking": true}}),
            json!({"result": {"sender": 1, "message": "echoed prompt"}}),
            json!({"result": {"sender": "ASSISTANT", "message": "Hel"}}),
            json!({"result": {"sender": 2, "message": "lo"}}),
            json!({"result": {"isSoftStop": true}}),
            json!({"result": {"sender": 2, "message": " after stop"}}),
        ]);
        assert_eq!(reply, "Hello");
    }

    #[test]
    fn test_fallback_when_empty() {
        assert_eq!(aggregate(&[]), FALLBACK_REPLY);
        assert_eq!(
            aggregate(&[json!({"result": {"sender": 2, "message": "x", "isThinking": true}})]),
            FALLBACK_REPLY
        );
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let mut agg = Aggregator::new();
        agg.push_line("not json");
        agg.push_line(r#"{"result":{"sender":2,"message":"ok"}}"#);
        assert!(!agg.is_finished());
        agg.push_line(r#"{"result":{"isSoftStop":true}}"#);
        assert!(agg.is_finished());
        assert_eq!(agg.into_reply(), "ok");
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("思考思考思"), 2);
    }

    #[test]
    fn test_build_response_shape() {
        let meta = ChunkMeta {
            id: "chatcmpl-abc".into(),
            created: 1_700_000_000,
            model: "grok-3".into(),
        };
        let resp = build_response(&meta, "Hello".into(), "0123456789");
        assert_json_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "id": "chatcmpl-abc",
                "object": "chat.completion",
                "created": 1_700_000_000,
                "model": "grok-3",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hello"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            })
        );
    }
}
