// Shared fixtures and deterministic collaborator stubs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use factloop::collaborators::{
    Assessor, CollaboratorError, Extractor, PatchProposer, Stage,
};
use factloop::corpus::Corpus;
use factloop::facts::{CoverageReport, ExtractionMetadata, Fact, FactCategory, FactSet};
use factloop::patch::RawPatchOp;
use factloop::refine::{LoopConfig, RefinementLoop};

/// Replays a queue of responses, then an optional repeating response.
pub struct Scripted<T> {
    queue: Mutex<VecDeque<Result<T, CollaboratorError>>>,
    repeat: Option<Result<T, CollaboratorError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl<T: Clone> Scripted<T> {
    pub fn new(responses: Vec<Result<T, CollaboratorError>>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            repeat: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(response: Result<T, CollaboratorError>) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self, stage: Stage) -> Result<T, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queue.lock().unwrap().pop_front();
        match (queued, &self.repeat) {
            (Some(response), _) => response,
            (None, Some(response)) => response.clone(),
            (None, None) => Err(CollaboratorError::schema_violation(
                stage,
                "stub script exhausted",
            )),
        }
    }
}

pub struct StubExtractor(pub Scripted<FactSet>);
pub struct StubAssessor(pub Scripted<CoverageReport>);
pub struct StubProposer(pub Scripted<Vec<RawPatchOp>>);

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _corpus: &Corpus) -> Result<FactSet, CollaboratorError> {
        self.0.next(Stage::Extract).await
    }
}

#[async_trait]
impl Assessor for StubAssessor {
    async fn assess(
        &self,
        _corpus: &Corpus,
        _facts: &FactSet,
    ) -> Result<CoverageReport, CollaboratorError> {
        self.0.next(Stage::Assess).await
    }
}

#[async_trait]
impl PatchProposer for StubProposer {
    async fn propose_patch(
        &self,
        _corpus: &Corpus,
        _facts: &FactSet,
        _report: &CoverageReport,
    ) -> Result<Vec<RawPatchOp>, CollaboratorError> {
        self.0.next(Stage::ProposePatch).await
    }
}

/// The three stubs plus the loop built over them
pub struct Harness {
    pub extractor: Arc<StubExtractor>,
    pub assessor: Arc<StubAssessor>,
    pub proposer: Arc<StubProposer>,
}

impl Harness {
    pub fn new(
        extractor: Scripted<FactSet>,
        assessor: Scripted<CoverageReport>,
        proposer: Scripted<Vec<RawPatchOp>>,
    ) -> Self {
        Self {
            extractor: Arc::new(StubExtractor(extractor)),
            assessor: Arc::new(StubAssessor(assessor)),
            proposer: Arc::new(StubProposer(proposer)),
        }
    }

    pub fn refinement(&self, config: LoopConfig) -> RefinementLoop {
        RefinementLoop::new(
            self.extractor.clone(),
            self.assessor.clone(),
            self.proposer.clone(),
            config,
        )
    }

    /// (extract, assess, propose) call counts
    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.extractor.0.calls(),
            self.assessor.0.calls(),
            self.proposer.0.calls(),
        )
    }
}

pub fn fact(n: u32, text: &str) -> Fact {
    Fact {
        id: format!("fact_{n:03}"),
        text: text.to_string(),
        source: "annual_report.txt".to_string(),
        confidence: 0.9,
        category: FactCategory::Organization,
        context: String::new(),
        extraction_method: "explicit_statement".to_string(),
    }
}

/// `fact_001..fact_{count}` with a fixed timestamp, so sets compare equal
pub fn fact_set(count: u32) -> FactSet {
    FactSet::new(
        (1..=count).map(|n| fact(n, &format!("Statement {n}"))).collect(),
        ExtractionMetadata {
            total_documents: 1,
            extraction_timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            model_used: "stub-model".to_string(),
        },
    )
}

pub fn gaps(missing: &[&str]) -> CoverageReport {
    CoverageReport {
        missing_facts: missing.iter().map(|s| s.to_string()).collect(),
        incorrect_facts: Vec::new(),
        recommendations: Vec::new(),
    }
}

pub fn no_gaps() -> CoverageReport {
    CoverageReport {
        recommendations: vec!["Consider adding context".to_string()],
        ..CoverageReport::default()
    }
}

pub fn corpus() -> Corpus {
    Corpus::from_text(
        "annual_report.txt",
        "Acme Corp was founded in 1999. Jane Doe is the CEO. Revenue was $12M in 2023.",
    )
}

/// Short timeouts and backoff so tests stay fast
pub fn config(max_iterations: usize) -> LoopConfig {
    LoopConfig {
        max_iterations,
        max_attempts: 2,
        call_timeout: Duration::from_secs(5),
        retry_base_delay: Duration::from_millis(10),
    }
}

pub fn add_fact_op(text: &str) -> RawPatchOp {
    RawPatchOp::add(serde_json::json!({
        "text": text,
        "source": "annual_report.txt",
        "confidence": 0.8,
        "category": "person",
    }))
}
