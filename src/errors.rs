// Error taxonomy for patch application, configuration and whole runs
//
// Collaborator failures live next to the collaborator traits
// (`crate::collaborators::CollaboratorError`); this module wraps them into the
// run-level error the CLI reports.

use std::path::PathBuf;
use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::facts::FactError;

/// Failure while applying a patch. Any variant aborts the whole patch.
///
/// `op` is the zero-based position of the offending operation in the patch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PatchError {
    #[error("op {op}: unknown or unsupported operation '{name}'")]
    UnknownOp { op: usize, name: String },

    #[error("op {op}: invalid path '{path}': {reason}")]
    InvalidPath {
        op: usize,
        path: String,
        reason: String,
    },

    #[error("op {op}: index {index} out of range (snapshot has {len} facts)")]
    IndexOutOfRange { op: usize, index: usize, len: usize },

    #[error("op {op}: index {index} refers to a fact already removed earlier in this patch")]
    AmbiguousIndex { op: usize, index: usize },

    #[error("op {op}: field '{field}' cannot be replaced")]
    ImmutableField { op: usize, field: String },

    #[error("op {op}: invalid fact value: {source}")]
    InvalidFactSchema {
        op: usize,
        #[source]
        source: FactError,
    },

    #[error("op {op}: fact id '{id}' already exists")]
    DuplicateFactId { op: usize, id: String },
}

impl PatchError {
    /// Short machine-readable name for logs and the audit trail
    pub fn kind(&self) -> &'static str {
        match self {
            PatchError::UnknownOp { .. } => "UnknownOp",
            PatchError::InvalidPath { .. } => "InvalidPath",
            PatchError::IndexOutOfRange { .. } => "IndexOutOfRange",
            PatchError::AmbiguousIndex { .. } => "AmbiguousIndex",
            PatchError::ImmutableField { .. } => "ImmutableField",
            PatchError::InvalidFactSchema { .. } => "InvalidFactSchema",
            PatchError::DuplicateFactId { .. } => "DuplicateFactId",
        }
    }
}

/// Invalid loop parameters, detected before any collaborator call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("call timeout must be greater than zero")]
    ZeroTimeout,

    #[error("corpus contains no usable text")]
    EmptyCorpus,

    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),
}

/// Reason a refinement run stopped abnormally
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("patch rejected: {0}")]
    Patch(#[from] PatchError),

    #[error("failed to persist run state: {0}")]
    Persistence(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("run task failed: {0}")]
    TaskFailed(String),
}

impl RunError {
    /// Error kind shown to the user on fatal failure
    pub fn kind(&self) -> String {
        match self {
            RunError::Config(_) => "ConfigError".to_string(),
            RunError::Collaborator(e) => format!("CollaboratorError::{}", e.kind),
            RunError::Patch(e) => format!("PatchError::{}", e.kind()),
            RunError::Persistence(_) => "PersistenceError".to_string(),
            RunError::Cancelled => "Cancelled".to_string(),
            RunError::TaskFailed(_) => "TaskFailed".to_string(),
        }
    }
}

/// A fatal run outcome with enough context to find the last good state
#[derive(Debug, Error)]
#[error("{error} (iteration {iteration})")]
pub struct RunFailure {
    #[source]
    pub error: RunError,
    /// Iteration during which the failure happened
    pub iteration: usize,
    /// Last successfully persisted FactSet snapshot, if any
    pub last_snapshot: Option<PathBuf>,
}
