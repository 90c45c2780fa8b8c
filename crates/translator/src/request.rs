use grok_bridge_core::conversation::{Message, Role};
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::types::grok::{GrokRequest, GrokResponseItem, Sender};
use grok_bridge_core::types::openai::ChatCompletionRequest;

/// Client model name that switches on upstream reasoning.
pub const REASONING_MODEL: &str = "grok-3t";
/// Client model name that switches on upstream deep search.
pub const DEEPSEARCH_MODEL: &str = "grok-3ds";

/// Pull the submitted messages out of a client request, normalizing roles and
/// flattening multi-part content to text.
pub fn extract_messages(req: &ChatCompletionRequest) -> Result<Vec<Message>, ProxyError> {
    let Some(messages) = req.messages.as_ref() else {
        return Err(ProxyError::BadRequest(
            "Invalid request body. Expected 'messages' in request body".into(),
        ));
    };
    if messages.is_empty() {
        return Err(ProxyError::BadRequest("'messages' cannot be empty".into()));
    }

    Ok(messages
        .iter()
        .map(|m| {
            let content = m.content.as_ref().map(|c| c.to_text()).unwrap_or_default();
            Message::new(Role::from_client(&m.role), content)
        })
        .collect())
}

/// Upstream sender code for a stored role. Only the assistant maps to the
/// assistant sender; system and user turns are both sent as user input.
pub fn sender_for(role: Role) -> u8 {
    match role {
        Role::Assistant => Sender::ASSISTANT_CODE,
        Role::User | Role::System => Sender::USER_CODE,
    }
}

/// Build the upstream payload by replaying the whole conversation history.
///
/// The model option is always `default_model`; the client model name only
/// toggles the reasoning or deep-search flag. Unknown names fall back silently.
pub fn build_grok_request(model: Option<&str>, history: &[Message], default_model: &str) -> GrokRequest {
    let responses = history
        .iter()
        .map(|m| GrokResponseItem {
            message: m.content.clone(),
            sender: sender_for(m.role),
            file_attachments: Vec::new(),
        })
        .collect();

    GrokRequest {
        responses,
        grok_model_option_id: default_model.to_string(),
        is_deepsearch: model == Some(DEEPSEARCH_MODEL),
        is_reasoning: model == Some(REASONING_MODEL),
    }
}
