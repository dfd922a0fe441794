//! Request types and mode dispatch.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Model used for conversational requests that do not name one.
pub const DEFAULT_FREE_MODEL: &str = "FireFlies:latest";

/// Model used for every vision request, regardless of what the caller asked for.
pub const VISION_MODEL: &str = "gemma3:4b";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message of a conversation, forwarded upstream verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A generation request as received from the caller.
///
/// The shape decides the mode: a request carrying image data is a vision
/// request, anything else is a conversation.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// The new user prompt.
    pub prompt: Option<String>,
    /// Requested model (ignored for vision).
    pub model: Option<String>,
    /// Base64 image, optionally as a `data:` URL.
    pub image: Option<String>,
    /// Prior messages in chronological order.
    pub history: Vec<ChatMessage>,
    /// Upstream address override.
    pub base_url: Option<String>,
}

impl GenerationRequest {
    /// A conversation request with no history.
    pub fn chat(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// A vision request for a single prompt and image.
    pub fn vision(prompt: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Set the requested model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the prior conversation.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Whether the request carries image data.
    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|image| !image.is_empty())
    }

    /// Model the upstream call will run, without consuming the request.
    pub fn selected_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        if self.has_image() {
            return VISION_MODEL;
        }
        self.model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(default_model)
    }

    /// Resolve the upstream call this request maps to.
    pub fn into_mode(self, default_model: &str) -> Result<RelayMode> {
        let has_image = self.has_image();
        let prompt = match self.prompt {
            Some(ref prompt) if !prompt.is_empty() => prompt.clone(),
            _ => return Err(RelayError::MissingField("prompt")),
        };

        if has_image {
            let image = self.image.unwrap_or_default();
            return Ok(RelayMode::Vision {
                model: VISION_MODEL,
                prompt,
                image: strip_data_url(&image).to_string(),
            });
        }

        let model = self.selected_model(default_model).to_string();

        let mut messages = self.history;
        messages.push(ChatMessage::user(prompt));

        Ok(RelayMode::Chat { model, messages })
    }
}

/// The upstream call a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMode {
    /// `POST /api/chat` with the full ordered conversation.
    Chat {
        model: String,
        messages: Vec<ChatMessage>,
    },
    /// `POST /api/generate` with one prompt and one image.
    Vision {
        model: &'static str,
        prompt: String,
        image: String,
    },
}

impl RelayMode {
    /// Model the upstream call will use.
    pub fn model(&self) -> &str {
        match self {
            RelayMode::Chat { model, .. } => model,
            RelayMode::Vision { model, .. } => model,
        }
    }
}

/// Strip a `data:<mime>;base64,` prefix, keeping raw base64 as is.
fn strip_data_url(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, data)) if !data.is_empty() => data,
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_appends_prompt_after_history() {
        let request = GenerationRequest::chat("third").with_history(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("second"),
        ]);

        let mode = request.into_mode(DEFAULT_FREE_MODEL).unwrap();
        match mode {
            RelayMode::Chat { model, messages } => {
                assert_eq!(model, DEFAULT_FREE_MODEL);
                assert_eq!(
                    messages,
                    vec![
                        ChatMessage::user("first"),
                        ChatMessage::assistant("second"),
                        ChatMessage::user("third"),
                    ]
                );
            }
            other => panic!("Expected chat mode, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_uses_requested_model() {
        let mode = GenerationRequest::chat("hi")
            .with_model("llama3:8b")
            .into_mode(DEFAULT_FREE_MODEL)
            .unwrap();
        assert_eq!(mode.model(), "llama3:8b");
    }

    #[test]
    fn test_vision_ignores_requested_model() {
        let mode = GenerationRequest::vision("what is this?", "data:image/png;base64,AAAA")
            .with_model("llama3:8b")
            .into_mode(DEFAULT_FREE_MODEL)
            .unwrap();

        assert_eq!(
            mode,
            RelayMode::Vision {
                model: VISION_MODEL,
                prompt: "what is this?".to_string(),
                image: "AAAA".to_string(),
            }
        );
    }

    #[test]
    fn test_vision_keeps_raw_base64() {
        let mode = GenerationRequest::vision("describe", "iVBORw0KGgo")
            .into_mode(DEFAULT_FREE_MODEL)
            .unwrap();
        match mode {
            RelayMode::Vision { image, .. } => assert_eq!(image, "iVBORw0KGgo"),
            other => panic!("Expected vision mode, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_image_routes_to_chat() {
        let mode = GenerationRequest::vision("hi", "")
            .into_mode(DEFAULT_FREE_MODEL)
            .unwrap();
        assert!(matches!(mode, RelayMode::Chat { .. }));
    }

    #[test]
    fn test_selected_model_matches_mode() {
        let vision = GenerationRequest::vision("describe", "AAAA").with_model("llama3:70b");
        assert_eq!(vision.selected_model(DEFAULT_FREE_MODEL), VISION_MODEL);
        assert_eq!(
            vision.into_mode(DEFAULT_FREE_MODEL).unwrap().model(),
            VISION_MODEL
        );

        let chat = GenerationRequest::chat("hi").with_model("  ");
        assert_eq!(chat.selected_model(DEFAULT_FREE_MODEL), DEFAULT_FREE_MODEL);

        let chat = GenerationRequest::chat("hi").with_model("llama3:70b");
        assert_eq!(chat.selected_model(DEFAULT_FREE_MODEL), "llama3:70b");
    }

    #[test]
    fn test_missing_prompt() {
        let result = GenerationRequest::default().into_mode(DEFAULT_FREE_MODEL);
        assert!(matches!(result, Err(RelayError::MissingField("prompt"))));

        let result = GenerationRequest::vision("", "AAAA").into_mode(DEFAULT_FREE_MODEL);
        assert!(matches!(result, Err(RelayError::MissingField("prompt"))));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);

        let parsed: std::result::Result<ChatMessage, _> =
            serde_json::from_str(r#"{"role":"system","content":"x"}"#);
        assert!(parsed.is_err());
    }
}
