// Convergence loop
//
// extract -> (assess -> patch -> apply)* until the assessor reports no gaps
// or the iteration budget is spent. Every step's input and output is written
// to the run store before the next step starts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::convergence::{next_step, within_budget, NextStep};
use super::types::{IterationState, LoopConfig, RefinementOutcome, StopReason};
use crate::collaborators::{
    with_retry, Assessor, CallPolicy, CollaboratorError, Extractor, Invocation, PatchProposer,
    Stage,
};
use crate::corpus::Corpus;
use crate::errors::{ConfigError, RunError, RunFailure};
use crate::facts::{CoverageReport, FactSet};
use crate::patch::{apply_ops, PatchOp, PatchStats};
use crate::store::{AuditEvent, RunStore};

/// Where a run had got to, for failure reporting
#[derive(Debug, Default)]
struct Progress {
    iteration: usize,
    last_snapshot: Option<PathBuf>,
}

pub struct RefinementLoop {
    extractor: Arc<dyn Extractor>,
    assessor: Arc<dyn Assessor>,
    proposer: Arc<dyn PatchProposer>,
    config: LoopConfig,
    cancel: CancellationToken,
}

impl RefinementLoop {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        assessor: Arc<dyn Assessor>,
        proposer: Arc<dyn PatchProposer>,
        config: LoopConfig,
    ) -> Self {
        Self {
            extractor,
            assessor,
            proposer,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// One collaborator playing all three roles (the LLM-backed case).
    pub fn with_collaborator<C>(collaborator: Arc<C>, config: LoopConfig) -> Self
    where
        C: Extractor + Assessor + PatchProposer + 'static,
    {
        Self::new(
            collaborator.clone(),
            collaborator.clone(),
            collaborator,
            config,
        )
    }

    /// Use an externally owned token, e.g. one cancelled on Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run to convergence or budget exhaustion.
    ///
    /// On failure every snapshot written so far stays on disk and the error
    /// names the last one.
    pub async fn run(
        &self,
        corpus: &Corpus,
        store: &RunStore,
    ) -> Result<RefinementOutcome, RunFailure> {
        let mut progress = Progress::default();

        match self.drive(corpus, store, &mut progress).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                warn!(
                    "Run {} failed at iteration {}: {}",
                    store.run_id(),
                    progress.iteration,
                    error
                );
                if let Err(e) = store.record(AuditEvent::Failed {
                    iteration: progress.iteration,
                    kind: error.kind(),
                    message: error.to_string(),
                }) {
                    warn!("Could not record failure in audit log: {e:#}");
                }
                Err(RunFailure {
                    error,
                    iteration: progress.iteration,
                    last_snapshot: progress.last_snapshot,
                })
            }
        }
    }

    async fn drive(
        &self,
        corpus: &Corpus,
        store: &RunStore,
        progress: &mut Progress,
    ) -> Result<RefinementOutcome, RunError> {
        // Fail fast, before any collaborator call
        self.config.validate()?;
        if corpus.is_empty() {
            return Err(ConfigError::EmptyCorpus.into());
        }

        let policy = self.config.call_policy();
        persist(store.record(AuditEvent::RunStarted {
            corpus: corpus.name().to_string(),
            corpus_digest: corpus.digest().to_string(),
            documents: corpus.document_count(),
            max_iterations: self.config.max_iterations,
            max_attempts: self.config.max_attempts,
        }))?;
        info!(
            "Refining '{}' ({} documents, max {} iterations) in {}",
            corpus.name(),
            corpus.document_count(),
            self.config.max_iterations,
            store.dir().display()
        );

        let seed = self.extract(corpus, &policy).await?;
        self.stage_completed(store, Stage::Extract, 0, &seed)?;
        info!("Extracted {} facts", seed.value.len());
        progress.last_snapshot = Some(persist(store.write_facts(0, &seed.value))?);

        let mut history = Vec::new();
        let mut state = IterationState::seed(seed.value);

        while within_budget(state.iteration, self.config.max_iterations) {
            let iteration = state.iteration;
            progress.iteration = iteration;

            let assessed = with_retry(Stage::Assess, &policy, &self.cancel, || {
                self.assessor.assess(corpus, &state.fact_set)
            })
            .await?;
            self.stage_completed(store, Stage::Assess, iteration, &assessed)?;
            let report = assessed.value;
            persist(store.write_assessment(iteration, &report))?;
            info!(
                "Iteration {}: {} missing, {} incorrect",
                iteration,
                report.missing_facts.len(),
                report.incorrect_facts.len()
            );

            if next_step(&report) == NextStep::Stop {
                persist(store.record(AuditEvent::Converged {
                    iteration,
                    facts: state.fact_set.len(),
                }))?;
                info!("Converged at iteration {}", iteration);
                let state = state.assessed(report, true);
                let final_facts = state.fact_set.clone();
                history.push(state);
                return Ok(RefinementOutcome {
                    final_facts,
                    converged: true,
                    iterations: iteration,
                    stop_reason: StopReason::Converged,
                    history,
                    remaining_gaps: CoverageReport::default(),
                    run_dir: store.dir().to_path_buf(),
                });
            }

            let proposed = with_retry(Stage::ProposePatch, &policy, &self.cancel, || {
                self.proposer.propose_patch(corpus, &state.fact_set, &report)
            })
            .await?;
            self.stage_completed(store, Stage::ProposePatch, iteration, &proposed)?;
            let raw_ops = proposed.value;
            persist(store.write_patch(iteration, &raw_ops))?;

            let ops = raw_ops
                .iter()
                .enumerate()
                .map(|(i, raw)| PatchOp::parse(i, raw))
                .collect::<Result<Vec<_>, _>>()?;
            let stats = PatchStats::from_ops(&ops);
            let next_facts = apply_ops(&state.fact_set, &ops)?;

            let version = iteration + 1;
            progress.last_snapshot = Some(persist(store.write_facts(version, &next_facts))?);
            persist(store.record(AuditEvent::patch_applied(
                iteration,
                version,
                stats,
                next_facts.len(),
            )))?;
            debug!(
                "Applied patch v{}: +{} ~{} -{} ({} facts)",
                iteration, stats.added, stats.replaced, stats.removed, next_facts.len()
            );

            let next_state = state.advance(next_facts);
            history.push(state.assessed(report, false));
            state = next_state;
            progress.iteration = state.iteration;
        }

        // Budget spent: the gaps are those of the last assessment
        let remaining_gaps = history
            .last()
            .and_then(|s| s.last_report.clone())
            .unwrap_or_default();
        persist(store.record(AuditEvent::BudgetExhausted {
            iterations: state.iteration,
            missing: remaining_gaps.missing_facts.len(),
            incorrect: remaining_gaps.incorrect_facts.len(),
        }))?;
        info!(
            "Stopped after {} iterations without convergence ({} gaps remain)",
            state.iteration,
            remaining_gaps.gap_count()
        );

        let final_facts = state.fact_set.clone();
        let iterations = state.iteration;
        history.push(state);
        Ok(RefinementOutcome {
            final_facts,
            converged: false,
            iterations,
            stop_reason: StopReason::MaxIterations,
            history,
            remaining_gaps,
            run_dir: store.dir().to_path_buf(),
        })
    }

    /// Seed extraction. A structurally invalid FactSet counts as a schema
    /// violation and is retried like any other collaborator failure.
    async fn extract(
        &self,
        corpus: &Corpus,
        policy: &CallPolicy,
    ) -> Result<Invocation<FactSet>, RunError> {
        let extractor = self.extractor.as_ref();
        with_retry(Stage::Extract, policy, &self.cancel, || async move {
            let facts = extractor.extract(corpus).await?;
            facts
                .validate()
                .map_err(|e| CollaboratorError::schema_violation(Stage::Extract, e.to_string()))?;
            Ok::<_, CollaboratorError>(facts)
        })
        .await
    }

    fn stage_completed<T>(
        &self,
        store: &RunStore,
        stage: Stage,
        iteration: usize,
        invocation: &Invocation<T>,
    ) -> Result<(), RunError> {
        debug!(
            "{} finished in {:?} after {} attempt(s)",
            stage, invocation.elapsed, invocation.attempts
        );
        persist(store.record(AuditEvent::StageCompleted {
            stage,
            iteration,
            attempts: invocation.attempts,
            duration_ms: millis(invocation.elapsed),
        }))
    }
}

fn persist<T>(result: anyhow::Result<T>) -> Result<T, RunError> {
    result.map_err(|e| RunError::Persistence(format!("{e:#}")))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
