use serde::{Deserialize, Serialize};

/// A single request handed to an AI provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    /// Optional system prompt. Empty = none.
    #[serde(default)]
    pub system_prompt: String,
    /// The user-role prompt.
    pub current_message: String,
    /// Override the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Override the provider's default sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Override the provider's default completion length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A structured message for chat-completion APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// What a provider returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    /// Raw completion text, untrimmed.
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u64>,
    pub processing_time_ms: u64,
}

impl Context {
    /// Create a context holding only a user prompt.
    pub fn new(message: &str) -> Self {
        Self {
            current_message: message.to_string(),
            ..Default::default()
        }
    }

    /// Convert to chat-completion messages (system first when present).
    pub fn to_api_messages(&self) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: self.system_prompt.clone(),
            });
        }
        messages.push(ApiMessage {
            role: "user".to_string(),
            content: self.current_message.clone(),
        });
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_api_messages_user_only() {
        let ctx = Context::new("hello");
        let messages = ctx.to_api_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hello");
    }

    #[test]
    fn test_to_api_messages_with_system_prompt() {
        let ctx = Context {
            system_prompt: "Be brief.".into(),
            ..Context::new("How are you?")
        };
        let messages = ctx.to_api_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "Be brief.");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn test_context_deserialize_minimal() {
        let json = r#"{"current_message":"hi"}"#;
        let ctx: Context = serde_json::from_str(json).unwrap();
        assert!(ctx.system_prompt.is_empty());
        assert!(ctx.model.is_none());
        assert!(ctx.temperature.is_none());
    }
}
