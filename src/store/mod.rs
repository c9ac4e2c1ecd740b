// Run persistence: versioned snapshots, audit log and final output

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub mod audit;
pub mod run_store;

pub use audit::{AuditEvent, AuditRecord};
pub use run_store::{RunStore, VersionEntry, AUDIT_FILE};

use crate::facts::FactSet;
use crate::refine::StopReason;

/// How the run ended, embedded in the output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementSummary {
    pub converged: bool,
    pub iterations: usize,
    pub stop_reason: StopReason,
}

/// Final FactSet plus the refinement summary, as written by `--output`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    #[serde(flatten)]
    pub facts: FactSet,
    pub refinement: RefinementSummary,
}

/// Load a FactSet from JSON. Extra top-level keys (like `refinement`) are
/// ignored, so a previous `--output` file is valid input.
pub fn read_fact_set(path: &Path) -> Result<FactSet> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let facts: FactSet = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid FactSet", path.display()))?;
    facts
        .validate()
        .with_context(|| format!("{} failed validation", path.display()))?;
    Ok(facts)
}

/// Pretty-print `value` to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
