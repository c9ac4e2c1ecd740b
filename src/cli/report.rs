// Human-facing progress and summaries

use anyhow::Result;
use crossterm::style::Stylize;
use std::path::Path;

use crate::corpus::Corpus;
use crate::errors::RunFailure;
use crate::refine::{BatchResult, RefinementOutcome, RunStatus};
use crate::store::RunStore;

pub fn print_corpus(corpus: &Corpus) {
    println!(
        "{} {} ({} documents, {} chars)",
        "▸".cyan().bold(),
        corpus.name().bold(),
        corpus.document_count(),
        corpus.text().chars().count()
    );
    for document in corpus.documents() {
        println!(
            "  {} {} ({}, {} pages, {} chars)",
            "·".dark_grey(),
            document.path.display(),
            document.document_type,
            document.page_count,
            document.char_count
        );
    }
}

pub fn print_outcome(label: &str, outcome: &RefinementOutcome) {
    if outcome.converged {
        println!(
            "{} {}: converged after {} iteration(s) with {} facts",
            "✓".green().bold(),
            label,
            outcome.iterations,
            outcome.final_facts.len()
        );
    } else {
        println!(
            "{} {}: stopped at max iterations ({}) with {} facts, {} missing and {} incorrect outstanding",
            "⚠".yellow().bold(),
            label,
            outcome.iterations,
            outcome.final_facts.len(),
            outcome.remaining_gaps.missing_facts.len(),
            outcome.remaining_gaps.incorrect_facts.len()
        );
    }
    println!("  Run directory: {}", outcome.run_dir.display());
}

pub fn print_failure(label: &str, failure: &RunFailure) {
    eprintln!(
        "{} {}: {} at iteration {}",
        "✗".red().bold(),
        label,
        failure.error.kind().red().bold(),
        failure.iteration
    );
    eprintln!("  {}", failure.error);
    match &failure.last_snapshot {
        Some(path) => eprintln!("  Last snapshot: {}", path.display()),
        None => eprintln!("  Last snapshot: (none written)"),
    }
}

pub fn print_written(path: &Path) {
    println!("  Wrote {}", path.display());
}

pub fn print_batch_summary(results: &[BatchResult]) {
    let count = |status: RunStatus| results.iter().filter(|r| r.status() == status).count();
    println!(
        "\n{} {} converged, {} at max iterations, {} failed",
        "Batch:".bold(),
        count(RunStatus::Converged).to_string().green(),
        count(RunStatus::MaxIterations).to_string().yellow(),
        count(RunStatus::Failed).to_string().red()
    );
}

pub fn print_history(store: &RunStore) -> Result<()> {
    println!("{} {}", "Run".bold(), store.run_id().cyan());

    let versions = store.versions()?;
    if versions.is_empty() {
        println!("  (no snapshots)");
    }
    for entry in &versions {
        let mark = |present: bool, name: &'static str| {
            if present {
                name.green().to_string()
            } else {
                name.dark_grey().to_string()
            }
        };
        println!(
            "  v{:<3} {} {} {}",
            entry.version,
            mark(entry.facts, "facts"),
            mark(entry.assessment, "assessment"),
            mark(entry.patch, "patch")
        );
    }

    println!("\n{}", "Audit trail".bold());
    for record in store.read_audit()? {
        println!(
            "  {} {:<16} {}",
            record.ts.format("%Y-%m-%d %H:%M:%S"),
            record.event.name(),
            record.event.summary()
        );
    }
    Ok(())
}
