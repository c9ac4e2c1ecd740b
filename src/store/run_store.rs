// Per-run state directory
//
// <state_dir>/<run_id>/
//   facts_v0.json        seed FactSet
//   assessment_v0.json   report on facts_v0
//   patch_v0.json        ops proposed from assessment_v0, as received
//   facts_v1.json        result of applying patch_v0
//   ...
//   audit.jsonl          append-only event log

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::audit::{AuditEvent, AuditRecord};
use crate::facts::{CoverageReport, FactSet};
use crate::patch::{PatchDocument, RawPatchOp};

pub const AUDIT_FILE: &str = "audit.jsonl";

/// Kinds of versioned artifact in a run directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Artifact {
    Facts,
    Assessment,
    Patch,
}

impl Artifact {
    fn prefix(&self) -> &'static str {
        match self {
            Artifact::Facts => "facts_v",
            Artifact::Assessment => "assessment_v",
            Artifact::Patch => "patch_v",
        }
    }

    fn file_name(&self, version: usize) -> String {
        format!("{}{}.json", self.prefix(), version)
    }

    fn parse(file_name: &str) -> Option<(Self, usize)> {
        let stem = file_name.strip_suffix(".json")?;
        [Artifact::Facts, Artifact::Assessment, Artifact::Patch]
            .into_iter()
            .find_map(|artifact| {
                let digits = stem.strip_prefix(artifact.prefix())?;
                digits.parse().ok().map(|version| (artifact, version))
            })
    }
}

/// Artifacts present for one version number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: usize,
    pub facts: bool,
    pub assessment: bool,
    pub patch: bool,
}

#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
    run_id: String,
}

impl RunStore {
    /// Create a fresh run directory under `base`.
    ///
    /// The id is a UTC timestamp plus a short random suffix, optionally
    /// prefixed with `label` (batch runs use the corpus name).
    pub fn create(base: &Path, label: Option<&str>) -> Result<Self> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let suffix = Uuid::new_v4().simple().to_string();
        let short = &suffix[..8];
        let run_id = match label.map(sanitize_label).filter(|l| !l.is_empty()) {
            Some(label) => format!("{label}-{stamp}-{short}"),
            None => format!("{stamp}-{short}"),
        };

        let dir = base.join(&run_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory {}", dir.display()))?;

        Ok(Self { dir, run_id })
    }

    /// Open an existing run directory (for `history`).
    pub fn at(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("Run directory not found: {}", dir.display());
        }
        let run_id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            dir: dir.to_path_buf(),
            run_id,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn facts_path(&self, version: usize) -> PathBuf {
        self.dir.join(Artifact::Facts.file_name(version))
    }

    pub fn write_facts(&self, version: usize, facts: &FactSet) -> Result<PathBuf> {
        self.write_json(Artifact::Facts.file_name(version), facts)
    }

    pub fn write_assessment(&self, version: usize, report: &CoverageReport) -> Result<PathBuf> {
        self.write_json(Artifact::Assessment.file_name(version), report)
    }

    /// Store ops exactly as proposed, before validation.
    pub fn write_patch(&self, version: usize, ops: &[RawPatchOp]) -> Result<PathBuf> {
        let document = PatchDocument {
            patch: ops.to_vec(),
        };
        self.write_json(Artifact::Patch.file_name(version), &document)
    }

    pub fn read_facts(&self, version: usize) -> Result<FactSet> {
        super::read_fact_set(&self.facts_path(version))
    }

    fn write_json<T: Serialize>(&self, file_name: String, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Append an event to `audit.jsonl`.
    pub fn record(&self, event: AuditEvent) -> Result<()> {
        let path = self.dir.join(AUDIT_FILE);
        let entry = AuditRecord {
            ts: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry).context("Failed to serialize audit event")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log: {}", path.display()))?;

        writeln!(file, "{}", json).context("Failed to write audit event")?;

        Ok(())
    }

    pub fn read_audit(&self) -> Result<Vec<AuditRecord>> {
        let path = self.dir.join(AUDIT_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read audit log: {}", path.display()))?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Malformed audit line {}", n + 1))
            })
            .collect()
    }

    /// Versions present on disk, ascending.
    pub fn versions(&self) -> Result<Vec<VersionEntry>> {
        let mut versions: BTreeMap<usize, VersionEntry> = BTreeMap::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let name = entry.file_name();
            let Some((artifact, version)) = Artifact::parse(&name.to_string_lossy()) else {
                continue;
            };
            let slot = versions.entry(version).or_insert_with(|| VersionEntry {
                version,
                ..VersionEntry::default()
            });
            match artifact {
                Artifact::Facts => slot.facts = true,
                Artifact::Assessment => slot.assessment = true,
                Artifact::Patch => slot.patch = true,
            }
        }

        Ok(versions.into_values().collect())
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
