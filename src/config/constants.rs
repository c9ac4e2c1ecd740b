// Project-wide constants
//
// Centralised here so defaults have one source of truth.
// Import via `use crate::config::constants::*;`.

/// Default maximum tokens for provider requests.
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

/// Default model for the Anthropic Messages API.
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";

/// Default model for OpenAI-compatible endpoints.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Assess/patch cycles before a run stops without convergence.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Total attempts per collaborator call (1 = no retry).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Per-call timeout. Extraction over a large corpus is the slow case.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 180;

/// First retry delay; doubles on each further attempt.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Directory under `$HOME` holding `config.toml`.
pub const CONFIG_DIR_NAME: &str = ".factloop";

/// File name of the config inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where run directories are created unless configured otherwise.
pub const DEFAULT_STATE_DIR: &str = "./factloop-runs";
