// Batch runs: one independent loop per corpus
//
// Instances share only the immutable loop (collaborators, config and the
// cancellation token). Each owns its corpus, run directory and state.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::loop_runner::RefinementLoop;
use super::types::{RefinementOutcome, RunStatus};
use crate::corpus::{Converter, Corpus};
use crate::errors::{RunError, RunFailure};
use crate::store::RunStore;

/// One corpus directory to refine
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub label: String,
    pub corpus_dir: PathBuf,
}

impl BatchJob {
    /// Label taken from the directory name.
    pub fn from_dir(corpus_dir: PathBuf) -> Self {
        let label = corpus_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| corpus_dir.display().to_string());
        Self { label, corpus_dir }
    }
}

#[derive(Debug)]
pub struct BatchResult {
    pub job: BatchJob,
    pub result: Result<RefinementOutcome, RunFailure>,
}

impl BatchResult {
    pub fn status(&self) -> RunStatus {
        RunStatus::of(&self.result)
    }
}

/// Worst status across a batch (an empty batch counts as converged).
pub fn worst_status(results: &[BatchResult]) -> RunStatus {
    results
        .iter()
        .map(BatchResult::status)
        .max()
        .unwrap_or(RunStatus::Converged)
}

/// Run every job concurrently; results come back in job order.
pub async fn run_batch(
    refinement: Arc<RefinementLoop>,
    converter: Arc<dyn Converter>,
    jobs: Vec<BatchJob>,
    state_dir: PathBuf,
) -> Vec<BatchResult> {
    let mut set = JoinSet::new();

    for (index, job) in jobs.iter().cloned().enumerate() {
        let refinement = refinement.clone();
        let converter = converter.clone();
        let state_dir = state_dir.clone();
        set.spawn(async move {
            let result = run_one(&refinement, converter, &job, state_dir).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<Result<RefinementOutcome, RunFailure>>> =
        jobs.iter().map(|_| None).collect();
    let mut join_errors = Vec::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => {
                tracing::warn!("Batch task failed: {e}");
                join_errors.push(e.to_string());
            }
        }
    }

    // A panicked task never reports its index; its slot stays empty.
    let mut join_errors = join_errors.into_iter();
    jobs.into_iter()
        .zip(slots)
        .map(|(job, slot)| {
            let result = slot.unwrap_or_else(|| {
                let message = join_errors
                    .next()
                    .unwrap_or_else(|| "task did not complete".to_string());
                Err(RunFailure {
                    error: RunError::TaskFailed(message),
                    iteration: 0,
                    last_snapshot: None,
                })
            });
            BatchResult { job, result }
        })
        .collect()
}

async fn run_one(
    refinement: &RefinementLoop,
    converter: Arc<dyn Converter>,
    job: &BatchJob,
    state_dir: PathBuf,
) -> Result<RefinementOutcome, RunFailure> {
    let early_failure = |error: RunError| RunFailure {
        error,
        iteration: 0,
        last_snapshot: None,
    };

    let corpus_dir = job.corpus_dir.clone();
    let corpus = tokio::task::spawn_blocking(move || {
        Corpus::from_dir(&corpus_dir, converter.as_ref())
    })
    .await
    .map_err(|e| early_failure(RunError::TaskFailed(e.to_string())))?
    .map_err(early_failure)?;

    let store = RunStore::create(&state_dir, Some(&job.label))
        .map_err(|e| early_failure(RunError::Persistence(format!("{e:#}"))))?;

    tracing::info!("[{}] run directory {}", job.label, store.dir().display());
    refinement.run(&corpus, &store).await
}
