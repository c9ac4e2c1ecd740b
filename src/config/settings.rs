// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::constants::*;
use super::provider::ProviderEntry;
use crate::errors::ConfigError;

/// Knobs for the refinement loop, the `[refinement]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementSettings {
    pub max_iterations: usize,
    /// Total attempts per collaborator call
    pub max_attempts: u32,
    pub call_timeout_secs: u64,
    pub retry_base_delay_ms: u64,
    /// Parent directory for per-run state directories
    pub state_dir: PathBuf,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl RefinementSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider; `None` until the file or environment supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderEntry>,

    #[serde(default)]
    pub refinement: RefinementSettings,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Check loop parameters. Provider presence is checked separately by
    /// [`Config::require_provider`] because `apply` and `history` never call one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refinement.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.refinement.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.refinement.call_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(provider) = &self.provider {
            if provider.api_key().trim().is_empty() {
                return Err(ConfigError::MissingApiKey(
                    provider.provider_type().to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn require_provider(&self) -> Result<&ProviderEntry, ConfigError> {
        match &self.provider {
            Some(p) if !p.api_key().trim().is_empty() => Ok(p),
            Some(p) => Err(ConfigError::MissingApiKey(p.provider_type().to_string())),
            None => Err(ConfigError::MissingApiKey("any provider".to_string())),
        }
    }
}
