// Multi-provider LLM support
//
// This module provides an abstraction layer over different LLM providers
// (Claude, OpenAI-compatible endpoints) so the collaborators can run against
// whichever API the user has configured.

use anyhow::Result;
use async_trait::async_trait;

pub mod types;

// Provider implementations
pub mod claude;
pub mod openai;

// Provider factory
pub mod factory;

pub use claude::ClaudeProvider;
pub use factory::create_provider;
pub use openai::OpenAIProvider;
pub use types::{Message, ProviderRequest, ProviderResponse};

/// Request timeout for the HTTP client itself. The collaborator call policy
/// applies its own, usually shorter, per-call timeout on top.
pub const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Trait for LLM providers
///
/// All providers implement this trait, giving the collaborators a single
/// interface for sending a prompt and getting the complete response back.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a message and get a complete response
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse>;

    /// Get the provider name (e.g., "claude", "openai")
    fn name(&self) -> &str;

    /// Get the default model for this provider
    fn default_model(&self) -> &str;
}
