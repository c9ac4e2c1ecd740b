// Audit events, one JSON line each in `audit.jsonl`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::Stage;
use crate::patch::PatchStats;

/// An event in the life of a refinement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Run accepted its configuration and corpus
    RunStarted {
        corpus: String,
        corpus_digest: String,
        documents: usize,
        max_iterations: usize,
        max_attempts: u32,
    },
    /// A collaborator call succeeded (possibly after retries)
    StageCompleted {
        stage: Stage,
        iteration: usize,
        attempts: u32,
        duration_ms: u64,
    },
    /// A patch was applied, producing `facts_v{version}`
    PatchApplied {
        iteration: usize,
        version: usize,
        added: usize,
        replaced: usize,
        removed: usize,
        facts: usize,
    },
    /// The assessor reported no gaps
    Converged { iteration: usize, facts: usize },
    /// Iteration budget used up with gaps remaining
    BudgetExhausted {
        iterations: usize,
        missing: usize,
        incorrect: usize,
    },
    /// Run aborted
    Failed {
        iteration: usize,
        kind: String,
        message: String,
    },
}

impl AuditEvent {
    pub fn patch_applied(iteration: usize, version: usize, stats: PatchStats, facts: usize) -> Self {
        AuditEvent::PatchApplied {
            iteration,
            version,
            added: stats.added,
            replaced: stats.replaced,
            removed: stats.removed,
            facts,
        }
    }

    /// Snake-case tag as written to the log
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::RunStarted { .. } => "run_started",
            AuditEvent::StageCompleted { .. } => "stage_completed",
            AuditEvent::PatchApplied { .. } => "patch_applied",
            AuditEvent::Converged { .. } => "converged",
            AuditEvent::BudgetExhausted { .. } => "budget_exhausted",
            AuditEvent::Failed { .. } => "failed",
        }
    }

    /// One-line human summary for `history`
    pub fn summary(&self) -> String {
        match self {
            AuditEvent::RunStarted {
                corpus,
                documents,
                max_iterations,
                ..
            } => format!("corpus '{corpus}' ({documents} documents), max {max_iterations} iterations"),
            AuditEvent::StageCompleted {
                stage,
                iteration,
                attempts,
                duration_ms,
            } => format!(
                "{stage} (iteration {iteration}) in {duration_ms}ms, {attempts} attempt(s)"
            ),
            AuditEvent::PatchApplied {
                version,
                added,
                replaced,
                removed,
                facts,
                ..
            } => format!("v{version}: +{added} ~{replaced} -{removed} -> {facts} facts"),
            AuditEvent::Converged { iteration, facts } => {
                format!("converged at iteration {iteration} with {facts} facts")
            }
            AuditEvent::BudgetExhausted {
                iterations,
                missing,
                incorrect,
            } => format!(
                "stopped after {iterations} iterations ({missing} missing, {incorrect} incorrect)"
            ),
            AuditEvent::Failed {
                iteration,
                kind,
                message,
            } => format!("{kind} at iteration {iteration}: {message}"),
        }
    }
}

/// A logged event with its timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_and_timestamp() {
        let record = AuditRecord {
            ts: Utc::now(),
            event: AuditEvent::patch_applied(
                0,
                1,
                PatchStats {
                    added: 2,
                    replaced: 1,
                    removed: 0,
                },
                5,
            ),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["event"], "patch_applied");
        assert_eq!(value["added"], 2);
        assert_eq!(value["facts"], 5);
        assert!(value["ts"].is_string());
    }

    #[test]
    fn test_stage_serialises_snake_case() {
        let event = AuditEvent::StageCompleted {
            stage: Stage::ProposePatch,
            iteration: 2,
            attempts: 1,
            duration_ms: 40,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["stage"], "propose_patch");
        assert_eq!(event.name(), "stage_completed");
        assert!(event.summary().starts_with("propose_patch (iteration 2)"));
    }
}
