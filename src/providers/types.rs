// Unified request/response types for multi-provider LLM support
//
// These types abstract over provider-specific formats (Claude, OpenAI, ...)
// allowing the rest of the codebase to work with a unified interface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Unified request format for all LLM providers
///
/// Each provider implementation transforms this into its specific API format.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Conversation messages
    pub messages: Vec<Message>,

    /// Model name (provider-specific); empty means the provider default
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// System prompt (sent as `system` for Claude, prepended as a
    /// `{"role":"system"}` message for OpenAI-compatible providers)
    pub system: Option<String>,

    /// Temperature (0.0 to 1.0, optional)
    pub temperature: Option<f32>,

    /// Ask the provider for a JSON object response where supported
    pub json_output: bool,
}

impl ProviderRequest {
    /// Create a new request from messages
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: String::new(), // Will be set by provider
            max_tokens: 4096,
            system: None,
            temperature: None,
            json_output: false,
        }
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_json_output(mut self, json_output: bool) -> Self {
        self.json_output = json_output;
        self
    }

    /// Model to use, falling back to the provider default
    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        if self.model.is_empty() {
            default_model
        } else {
            &self.model
        }
    }
}

/// Unified response format from all LLM providers
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Response ID (provider-specific)
    pub id: String,

    /// Model that generated the response
    pub model: String,

    /// Concatenated text content
    pub text: String,

    /// Stop reason (e.g., "end_turn", "stop", "max_tokens")
    pub stop_reason: Option<String>,

    /// Which provider generated this response
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ProviderRequest::new(vec![Message::user("Hello")])
            .with_model("gpt-4o")
            .with_max_tokens(100)
            .with_system("be brief")
            .with_json_output(true);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert!(request.json_output);
    }

    #[test]
    fn test_model_or_default() {
        let request = ProviderRequest::new(vec![]);
        assert_eq!(request.model_or("fallback"), "fallback");
        let request = request.with_model("explicit");
        assert_eq!(request.model_or("fallback"), "explicit");
    }
}
