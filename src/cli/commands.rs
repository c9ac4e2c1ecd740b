// Subcommand handlers
//
// Each handler returns the process exit code: 0 converged (or success for
// `apply`/`history`), 2 stopped at max iterations, 1 failure.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::report;
use super::{ApplyArgs, BatchArgs, Cli, Command, HistoryArgs, LoopArgs, RunArgs};
use crate::collaborators::LlmCollaborator;
use crate::config::{load_config, Config};
use crate::corpus::{Converter, Corpus, FileConverter};
use crate::errors::RunFailure;
use crate::facts::FactSet;
use crate::patch::{apply, PatchDocument};
use crate::providers::create_provider;
use crate::refine::{
    run_batch, worst_status, BatchJob, LoopConfig, RefinementLoop, RunStatus,
};
use crate::store::{read_fact_set, write_json_file, FinalReport, RefinementSummary, RunStore};

pub async fn execute(cli: Cli, cancel: CancellationToken) -> Result<u8> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => run(args, config_path, cancel).await,
        Command::Batch(args) => batch(args, config_path, cancel).await,
        Command::Apply(args) => apply_command(args),
        Command::History(args) => history(args),
    }
}

/// File config, then CLI overrides, then validation.
fn resolve_config(path: Option<&Path>, overrides: &LoopArgs) -> Result<Config> {
    let mut config = load_config(path)?;
    overrides.apply_to(&mut config.refinement);
    config.validate().context("Invalid refinement settings")?;
    Ok(config)
}

fn build_loop(
    config: &Config,
    model: Option<&str>,
    cancel: CancellationToken,
) -> Result<RefinementLoop> {
    let entry = config.require_provider()?;
    let provider = create_provider(entry)?;

    let mut collaborator = LlmCollaborator::new(provider);
    if let Some(max_tokens) = entry.max_tokens() {
        collaborator = collaborator.with_max_tokens(max_tokens);
    }
    if let Some(model) = model {
        collaborator = collaborator.with_model(model);
    }
    tracing::info!(
        "Using {} provider, model {}",
        entry.provider_type(),
        collaborator.model_name()
    );

    Ok(RefinementLoop::with_collaborator(
        Arc::new(collaborator),
        LoopConfig::from(&config.refinement),
    )
    .with_cancellation(cancel))
}

async fn run(args: RunArgs, config_path: Option<&Path>, cancel: CancellationToken) -> Result<u8> {
    let config = resolve_config(config_path, &args.loop_args)?;
    let refinement = build_loop(&config, args.loop_args.model.as_deref(), cancel)?;

    let corpus = match Corpus::from_dir(&args.corpus, &FileConverter) {
        Ok(corpus) => corpus,
        Err(error) => {
            report::print_failure(
                &args.corpus.display().to_string(),
                &RunFailure {
                    error,
                    iteration: 0,
                    last_snapshot: None,
                },
            );
            return Ok(RunStatus::Failed.exit_code());
        }
    };
    report::print_corpus(&corpus);

    let store = RunStore::create(&config.refinement.state_dir, None)?;
    let result = refinement.run(&corpus, &store).await;

    match &result {
        Ok(outcome) => {
            report::print_outcome(corpus.name(), outcome);
            if let Some(output) = &args.output {
                write_final_report(output, outcome)?;
                report::print_written(output);
            }
        }
        Err(failure) => report::print_failure(corpus.name(), failure),
    }

    Ok(RunStatus::of(&result).exit_code())
}

async fn batch(
    args: BatchArgs,
    config_path: Option<&Path>,
    cancel: CancellationToken,
) -> Result<u8> {
    let config = resolve_config(config_path, &args.loop_args)?;
    let refinement = Arc::new(build_loop(
        &config,
        args.loop_args.model.as_deref(),
        cancel,
    )?);
    let converter: Arc<dyn Converter> = Arc::new(FileConverter::new());

    let jobs = unique_labels(args.corpora.into_iter().map(BatchJob::from_dir).collect());
    let results = run_batch(
        refinement,
        converter,
        jobs,
        config.refinement.state_dir.clone(),
    )
    .await;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    for result in &results {
        match &result.result {
            Ok(outcome) => {
                report::print_outcome(&result.job.label, outcome);
                let output = args.output_dir.join(format!("{}.json", result.job.label));
                write_final_report(&output, outcome)?;
                report::print_written(&output);
            }
            Err(failure) => report::print_failure(&result.job.label, failure),
        }
    }

    let worst = worst_status(&results);
    report::print_batch_summary(&results);
    Ok(worst.exit_code())
}

/// Suffix repeated corpus names so outputs do not overwrite each other.
fn unique_labels(jobs: Vec<BatchJob>) -> Vec<BatchJob> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    jobs.into_iter()
        .map(|mut job| {
            let count = seen.entry(job.label.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                job.label = format!("{}-{}", job.label, count);
            }
            job
        })
        .collect()
}

fn write_final_report(path: &Path, outcome: &crate::refine::RefinementOutcome) -> Result<()> {
    let report = FinalReport {
        facts: outcome.final_facts.clone(),
        refinement: RefinementSummary {
            converged: outcome.converged,
            iterations: outcome.iterations,
            stop_reason: outcome.stop_reason,
        },
    };
    write_json_file(path, &report)
}

/// Apply a stored patch file to a stored FactSet with in-loop semantics.
pub fn apply_patch_file(facts_path: &Path, patch_path: &Path) -> Result<FactSet> {
    let facts = read_fact_set(facts_path)?;
    let contents = fs::read_to_string(patch_path)
        .with_context(|| format!("Failed to read {}", patch_path.display()))?;
    let document = PatchDocument::from_json_str(&contents)?;
    let patched = apply(&facts, &document.patch)
        .with_context(|| format!("Patch {} rejected", patch_path.display()))?;
    Ok(patched)
}

fn apply_command(args: ApplyArgs) -> Result<u8> {
    let patched = apply_patch_file(&args.facts, &args.patch)?;
    match &args.output {
        Some(output) => {
            write_json_file(output, &patched)?;
            report::print_written(output);
        }
        None => {
            let json = serde_json::to_string_pretty(&patched)
                .context("Failed to serialize FactSet")?;
            println!("{json}");
        }
    }
    Ok(0)
}

fn history(args: HistoryArgs) -> Result<u8> {
    let store = RunStore::at(&args.run_dir)?;
    report::print_history(&store)?;
    Ok(0)
}
