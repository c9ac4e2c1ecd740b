// Provider factory
//
// Creates LLM providers from the configured provider entry

use anyhow::Result;
use std::sync::Arc;

use super::claude::ClaudeProvider;
use super::openai::OpenAIProvider;
use super::LlmProvider;
use crate::config::ProviderEntry;

/// Create an `LlmProvider` from a `ProviderEntry`.
pub fn create_provider(entry: &ProviderEntry) -> Result<Arc<dyn LlmProvider>> {
    let model = entry.effective_model();
    match entry {
        ProviderEntry::Claude {
            api_key, base_url, ..
        } => {
            let mut provider = ClaudeProvider::new(api_key.clone())?.with_model(model);
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }

        ProviderEntry::Openai {
            api_key, base_url, ..
        } => {
            let mut provider = OpenAIProvider::new_openai(api_key.clone())?.with_model(model);
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_claude_with_model_override() {
        let entry = ProviderEntry::Claude {
            api_key: "k".to_string(),
            model: Some("claude-custom".to_string()),
            base_url: None,
            max_tokens: None,
        };
        let provider = create_provider(&entry).unwrap();
        assert_eq!(provider.name(), "claude");
        assert_eq!(provider.default_model(), "claude-custom");
    }

    #[test]
    fn test_create_openai_default_model() {
        let entry = ProviderEntry::Openai {
            api_key: "k".to_string(),
            model: None,
            base_url: Some("http://localhost:8080/".to_string()),
            max_tokens: None,
        };
        let provider = create_provider(&entry).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(
            provider.default_model(),
            crate::config::constants::DEFAULT_OPENAI_MODEL
        );
    }
}
