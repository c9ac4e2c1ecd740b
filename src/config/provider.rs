// Provider entry: which LLM API the collaborators talk to.

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_CLAUDE_MODEL, DEFAULT_OPENAI_MODEL};

/// A single provider entry, serialized with a `type` tag:
///
/// ```toml
/// [provider]
/// type = "claude"
/// api_key = "sk-ant-..."
/// model = "claude-sonnet-4-20250514"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderEntry {
    Claude {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,
    },
    Openai {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,
    },
}

impl ProviderEntry {
    /// Entry for the Anthropic API with only a key set.
    pub fn claude(api_key: impl Into<String>) -> Self {
        Self::Claude {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            max_tokens: None,
        }
    }

    /// Entry for the OpenAI API with only a key set.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::Openai {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            max_tokens: None,
        }
    }

    /// Short provider-type tag ("claude" or "openai").
    pub fn provider_type(&self) -> &'static str {
        match self {
            Self::Claude { .. } => "claude",
            Self::Openai { .. } => "openai",
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            Self::Claude { api_key, .. } | Self::Openai { api_key, .. } => api_key,
        }
    }

    /// Model actually used once defaults are applied.
    pub fn effective_model(&self) -> &str {
        match self {
            Self::Claude { model, .. } => model.as_deref().unwrap_or(DEFAULT_CLAUDE_MODEL),
            Self::Openai { model, .. } => model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
        }
    }

    pub fn max_tokens(&self) -> Option<u32> {
        match self {
            Self::Claude { max_tokens, .. } | Self::Openai { max_tokens, .. } => *max_tokens,
        }
    }
}
