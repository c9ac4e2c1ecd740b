// External collaborators
//
// Extraction, coverage assessment and patch proposal are delegated to a
// model. The loop only sees these narrow capabilities, so tests can swap in
// deterministic fakes and production code can plug in any LLM provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::corpus::Corpus;
use crate::facts::{CoverageReport, FactSet};
use crate::patch::RawPatchOp;

pub mod llm;
pub mod prompts;
pub mod response;
pub mod retry;

pub use llm::LlmCollaborator;
pub use retry::{with_retry, CallPolicy, Invocation};

/// Pipeline stage a collaborator call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Convert,
    Extract,
    Assess,
    ProposePatch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Convert => "convert",
            Stage::Extract => "extract",
            Stage::Assess => "assess",
            Stage::ProposePatch => "propose_patch",
        })
    }
}

/// Failure category of a collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollaboratorErrorKind {
    /// No response within the per-call timeout
    Timeout,
    /// Response was not parseable at all (e.g. not JSON)
    InvalidResponse,
    /// Response parsed but did not match the expected shape or invariants
    SchemaViolation,
    /// Network, HTTP or I/O failure reaching the collaborator
    TransportError,
}

impl fmt::Display for CollaboratorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollaboratorErrorKind::Timeout => "Timeout",
            CollaboratorErrorKind::InvalidResponse => "InvalidResponse",
            CollaboratorErrorKind::SchemaViolation => "SchemaViolation",
            CollaboratorErrorKind::TransportError => "TransportError",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{stage} {kind}: {message}")]
pub struct CollaboratorError {
    pub stage: Stage,
    pub kind: CollaboratorErrorKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(stage: Stage, kind: CollaboratorErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, CollaboratorErrorKind::Timeout, message)
    }

    pub fn invalid_response(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, CollaboratorErrorKind::InvalidResponse, message)
    }

    pub fn schema_violation(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, CollaboratorErrorKind::SchemaViolation, message)
    }

    pub fn transport(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, CollaboratorErrorKind::TransportError, message)
    }
}

/// Produces the seed FactSet from corpus text
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, corpus: &Corpus) -> Result<FactSet, CollaboratorError>;
}

/// Compares a FactSet against the corpus and reports gaps
#[async_trait]
pub trait Assessor: Send + Sync {
    async fn assess(
        &self,
        corpus: &Corpus,
        facts: &FactSet,
    ) -> Result<CoverageReport, CollaboratorError>;
}

/// Turns a gap report into patch operations against the current FactSet
#[async_trait]
pub trait PatchProposer: Send + Sync {
    async fn propose_patch(
        &self,
        corpus: &Corpus,
        facts: &FactSet,
        report: &CoverageReport,
    ) -> Result<Vec<RawPatchOp>, CollaboratorError>;
}
