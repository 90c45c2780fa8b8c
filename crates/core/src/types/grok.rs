use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ─── Request ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrokRequest {
    pub responses: Vec<GrokResponseItem>,
    pub grok_model_option_id: String,
    pub is_deepsearch: bool,
    pub is_reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrokResponseItem {
    pub message: String,
    /// Numeric sender code: 1 = user, 2 = assistant.
    pub sender: u8,
    pub file_attachments: Vec<Value>,
}

// ─── Stream events ─────────────────────────────────────────────────────────

/// Who produced an upstream fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub const USER_CODE: u8 = 1;
    pub const ASSISTANT_CODE: u8 = 2;

    pub fn code(self) -> u8 {
        match self {
            Self::User => Self::USER_CODE,
            Self::Assistant => Self::ASSISTANT_CODE,
        }
    }

    pub fn role(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl<'de> Deserialize<'de> for Sender {
    /// Upstream has been seen sending both numeric codes and upper-case names.
    /// `1`/`"USER"` is the user; every other value is treated as the assistant.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let is_user = match &raw {
            Value::Number(n) => n.as_u64() == Some(u64::from(Self::USER_CODE)),
            Value::String(s) => s.eq_ignore_ascii_case("user") || s == "1",
            _ => false,
        };
        Ok(if is_user { Self::User } else { Self::Assistant })
    }
}

/// One NDJSON line from the upstream response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrokEvent {
    #[serde(default)]
    pub result: Option<GrokResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrokResult {
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_thinking: Option<bool>,
    #[serde(default)]
    pub is_soft_stop: Option<bool>,
}

impl GrokEvent {
    /// A content fragment, if this event carries a sender.
    pub fn fragment(&self) -> Option<Fragment<'_>> {
        let result = self.result.as_ref()?;
        let sender = result.sender?;
        Some(Fragment {
            sender,
            text: result.message.as_deref().unwrap_or(""),
            thinking: result.is_thinking.unwrap_or(false),
        })
    }

    pub fn is_soft_stop(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.is_soft_stop)
            .unwrap_or(false)
    }
}

/// Borrowed view of a content-bearing upstream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub sender: Sender,
    pub text: &'a str,
    pub thinking: bool,
}
