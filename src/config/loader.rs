// Configuration loader
// Loads ~/.factloop/config.toml (or an explicit path), then falls back to
// environment variables for the provider key.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::provider::ProviderEntry;
use super::settings::Config;

/// Default config location, `~/.factloop/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration.
///
/// An explicit path must exist. The default path is optional; when absent
/// every section takes its defaults. A missing `[provider]` section is filled
/// from `ANTHROPIC_API_KEY`, then `OPENAI_API_KEY`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(explicit) => {
            if !explicit.exists() {
                bail!("Configuration file not found: {}", explicit.display());
            }
            read_config_file(explicit)?
        }
        None => match default_config_path() {
            Some(default) if default.exists() => read_config_file(&default)?,
            _ => Config::default(),
        },
    };

    if config.provider.is_none() {
        config.provider = provider_from_env(|key| std::env::var(key).ok());
        if let Some(provider) = &config.provider {
            tracing::debug!(
                "Using {} provider from environment",
                provider.provider_type()
            );
        }
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    let config = Config::from_toml_str(&contents)
        .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Environment fallback, parameterised over the lookup so tests stay hermetic.
fn provider_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<ProviderEntry> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
        return Some(ProviderEntry::claude(key));
    }
    non_empty("OPENAI_API_KEY").map(ProviderEntry::openai)
}
