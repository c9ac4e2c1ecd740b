// CLI module
// Argument definitions and subcommand dispatch for the `factloop` binary

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod report;

pub use commands::{apply_patch_file, execute};

use crate::config::RefinementSettings;

#[derive(Debug, Parser)]
#[command(
    name = "factloop",
    version,
    about = "Extract facts from a document corpus and refine them until coverage converges"
)]
pub struct Cli {
    /// Config file (default: ~/.factloop/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug-level logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refine one corpus until it converges or the iteration budget runs out
    Run(RunArgs),
    /// Refine several corpora concurrently, one independent run each
    Batch(BatchArgs),
    /// Apply a stored patch to a stored FactSet
    Apply(ApplyArgs),
    /// Show the versions and audit trail of a run directory
    History(HistoryArgs),
}

/// Overrides for the `[refinement]` config section
#[derive(Debug, Clone, Default, Args)]
pub struct LoopArgs {
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Total attempts per collaborator call (1 = no retry)
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Per-call timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Parent directory for run state
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Model override for every collaborator call
    #[arg(long)]
    pub model: Option<String>,
}

impl LoopArgs {
    pub fn apply_to(&self, settings: &mut RefinementSettings) {
        if let Some(n) = self.max_iterations {
            settings.max_iterations = n;
        }
        if let Some(n) = self.max_attempts {
            settings.max_attempts = n;
        }
        if let Some(secs) = self.timeout_secs {
            settings.call_timeout_secs = secs;
        }
        if let Some(dir) = &self.state_dir {
            settings.state_dir = dir.clone();
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory of source documents
    #[arg(long, value_name = "DIR")]
    pub corpus: PathBuf,

    /// Write the final FactSet and refinement summary here
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub loop_args: LoopArgs,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Corpus directory; repeat for each corpus
    #[arg(long = "corpus", value_name = "DIR", required = true)]
    pub corpora: Vec<PathBuf>,

    /// One `<corpus name>.json` output per corpus
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub loop_args: LoopArgs,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// FactSet JSON (a facts_vN.json snapshot or a previous --output file)
    #[arg(long, value_name = "FILE")]
    pub facts: PathBuf,

    /// Patch JSON: `{"patch": [...]}` or a bare array of ops
    #[arg(long, value_name = "FILE")]
    pub patch: PathBuf,

    /// Write the patched FactSet here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Run directory (`<state_dir>/<run_id>`)
    pub run_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "factloop",
            "run",
            "--corpus",
            "docs",
            "--max-iterations",
            "3",
            "--output",
            "out.json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.corpus, PathBuf::from("docs"));
                assert_eq!(args.loop_args.max_iterations, Some(3));
                assert_eq!(args.output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_batch_requires_corpus() {
        assert!(Cli::try_parse_from(["factloop", "batch", "--output-dir", "out"]).is_err());
        let cli = Cli::try_parse_from([
            "factloop",
            "batch",
            "--corpus",
            "a",
            "--corpus",
            "b",
            "--output-dir",
            "out",
        ])
        .unwrap();
        match cli.command {
            Command::Batch(args) => assert_eq!(args.corpora.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_loop_args_override_settings() {
        let mut settings = RefinementSettings::default();
        let args = LoopArgs {
            max_iterations: Some(9),
            timeout_secs: Some(15),
            ..LoopArgs::default()
        };
        args.apply_to(&mut settings);
        assert_eq!(settings.max_iterations, 9);
        assert_eq!(settings.call_timeout_secs, 15);
        assert_eq!(settings.max_attempts, RefinementSettings::default().max_attempts);
    }
}
