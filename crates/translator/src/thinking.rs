//! Two-state machine that brackets upstream reasoning output with markers.
//!
//! One instance lives for one upstream response. Each fragment drives a single
//! transition that yields the emissions the client should see, in order.

use grok_bridge_core::types::grok::Sender;

pub const OPEN_MARKER: &str = "<think>\n";
pub const CLOSE_MARKER: &str = "\n</think>\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkingState {
    #[default]
    Normal,
    Thinking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    OpenThinking,
    /// Reasoning text; surfaced to the client, never stored.
    Thinking(String),
    CloseThinking,
    Content { sender: Sender, text: String },
}

impl ThinkingState {
    /// Apply one upstream fragment. Empty text produces no text emission but
    /// still moves the state, so markers stay balanced.
    pub fn on_fragment(self, sender: Sender, text: &str, thinking: bool) -> (Self, Vec<Emission>) {
        let mut out = Vec::with_capacity(2);
        let next = match (self, thinking) {
            (Self::Normal, true) => {
                out.push(Emission::OpenThinking);
                push_thinking(&mut out, text);
                Self::Thinking
            }
            (Self::Thinking, true) => {
                push_thinking(&mut out, text);
                Self::Thinking
            }
            (Self::Thinking, false) => {
                out.push(Emission::CloseThinking);
                push_content(&mut out, sender, text);
                Self::Normal
            }
            (Self::Normal, false) => {
                push_content(&mut out, sender, text);
                Self::Normal
            }
        };
        (next, out)
    }

    /// Terminate an open thinking span, if any.
    pub fn close(self) -> (Self, Option<Emission>) {
        match self {
            Self::Thinking => (Self::Normal, Some(Emission::CloseThinking)),
            Self::Normal => (Self::Normal, None),
        }
    }

    pub fn is_thinking(self) -> bool {
        self == Self::Thinking
    }
}

fn push_thinking(out: &mut Vec<Emission>, text: &str) {
    if !text.is_empty() {
        out.push(Emission::Thinking(text.to_string()));
    }
}

fn push_content(out: &mut Vec<Emission>, sender: Sender, text: &str) {
    if !text.is_empty() {
        out.push(Emission::Content {
            sender,
            text: text.to_string(),
        });
    }
}
