// Loop configuration, per-iteration state and outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::collaborators::CallPolicy;
use crate::config::constants::*;
use crate::config::RefinementSettings;
use crate::errors::{ConfigError, RunFailure};
use crate::facts::{CoverageReport, FactSet};

/// Parameters of one refinement run
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Assess/patch cycles allowed before giving up on convergence
    pub max_iterations: usize,
    /// Total attempts per collaborator call
    pub max_attempts: u32,
    pub call_timeout: Duration,
    pub retry_base_delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl From<&RefinementSettings> for LoopConfig {
    fn from(settings: &RefinementSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            max_attempts: settings.max_attempts,
            call_timeout: settings.call_timeout(),
            retry_base_delay: settings.retry_base_delay(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            max_attempts: self.max_attempts,
            timeout: self.call_timeout,
            base_delay: self.retry_base_delay,
        }
    }
}

/// Snapshot of the loop at one iteration boundary.
///
/// A new state is built for every iteration; earlier ones stay in the run
/// history untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    /// Version number; `fact_set` is persisted as `facts_v{iteration}.json`
    pub iteration: usize,
    pub fact_set: FactSet,
    /// Report produced by the assessor for this state, once assessed
    pub last_report: Option<CoverageReport>,
    pub converged: bool,
}

impl IterationState {
    pub fn seed(fact_set: FactSet) -> Self {
        Self {
            iteration: 0,
            fact_set,
            last_report: None,
            converged: false,
        }
    }

    /// This state with its assessment attached.
    pub fn assessed(self, report: CoverageReport, converged: bool) -> Self {
        Self {
            last_report: Some(report),
            converged,
            ..self
        }
    }

    /// State for the next iteration, holding the patched FactSet.
    pub fn advance(&self, fact_set: FactSet) -> Self {
        Self {
            iteration: self.iteration + 1,
            fact_set,
            last_report: None,
            converged: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The assessor reported no missing and no incorrect facts
    Converged,
    /// `max_iterations` patches applied with gaps remaining
    MaxIterations,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Converged => "converged",
            StopReason::MaxIterations => "max_iterations",
        })
    }
}

/// Result of a run that terminated normally
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub final_facts: FactSet,
    pub converged: bool,
    /// Patches applied; the final FactSet is `facts_v{iterations}.json`
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// Every state the loop passed through, oldest first
    pub history: Vec<IterationState>,
    /// Gaps in the last assessment (empty when converged)
    pub remaining_gaps: CoverageReport,
    pub run_dir: PathBuf,
}

/// Terminal status of a run, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStatus {
    Converged,
    MaxIterations,
    Failed,
}

impl RunStatus {
    pub fn of(result: &Result<RefinementOutcome, RunFailure>) -> Self {
        match result {
            Ok(outcome) if outcome.converged => RunStatus::Converged,
            Ok(_) => RunStatus::MaxIterations,
            Err(_) => RunStatus::Failed,
        }
    }

    /// Process exit code: 0 converged, 2 budget exhausted, 1 failure
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Converged => 0,
            RunStatus::MaxIterations => 2,
            RunStatus::Failed => 1,
        }
    }
}
