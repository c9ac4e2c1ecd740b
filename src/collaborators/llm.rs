// Model-backed collaborator
//
// Implements all three model stages over a single LlmProvider.

use async_trait::async_trait;
use std::sync::Arc;

use super::prompts::{assessment_prompt, extraction_prompt, patch_prompt, SYSTEM_PROMPT};
use super::response::{parse_assessment, parse_extraction, parse_json_object, parse_patch};
use super::{Assessor, CollaboratorError, Extractor, PatchProposer, Stage};
use crate::config::constants::DEFAULT_MAX_TOKENS;
use crate::corpus::Corpus;
use crate::facts::{CoverageReport, FactSet};
use crate::patch::RawPatchOp;
use crate::providers::{LlmProvider, Message, ProviderRequest};

pub struct LlmCollaborator {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    max_tokens: u32,
}

impl LlmCollaborator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the provider's default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Model name recorded in extraction metadata
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// One request/response round trip; returns the response text.
    async fn complete(&self, stage: Stage, prompt: String) -> Result<String, CollaboratorError> {
        let mut request = ProviderRequest::new(vec![Message::user(prompt)])
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens)
            .with_temperature(0.0)
            .with_json_output(true);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        tracing::debug!(
            "{} request to {} ({} prompt chars)",
            stage,
            self.provider.name(),
            request.messages.iter().map(|m| m.content.len()).sum::<usize>()
        );

        let response = self
            .provider
            .send_message(&request)
            .await
            .map_err(|e| CollaboratorError::transport(stage, format!("{e:#}")))?;

        if response.text.trim().is_empty() {
            return Err(CollaboratorError::invalid_response(
                stage,
                format!(
                    "empty response (stop reason: {})",
                    response.stop_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        Ok(response.text)
    }
}

#[async_trait]
impl Extractor for LlmCollaborator {
    async fn extract(&self, corpus: &Corpus) -> Result<FactSet, CollaboratorError> {
        let text = self
            .complete(Stage::Extract, extraction_prompt(corpus))
            .await?;
        let value = parse_json_object(Stage::Extract, &text)?;
        parse_extraction(&value, corpus.document_count(), self.model_name())
    }
}

#[async_trait]
impl Assessor for LlmCollaborator {
    async fn assess(
        &self,
        corpus: &Corpus,
        facts: &FactSet,
    ) -> Result<CoverageReport, CollaboratorError> {
        let text = self
            .complete(Stage::Assess, assessment_prompt(corpus, facts))
            .await?;
        let value = parse_json_object(Stage::Assess, &text)?;
        parse_assessment(&value)
    }
}

#[async_trait]
impl PatchProposer for LlmCollaborator {
    async fn propose_patch(
        &self,
        corpus: &Corpus,
        facts: &FactSet,
        report: &CoverageReport,
    ) -> Result<Vec<RawPatchOp>, CollaboratorError> {
        let text = self
            .complete(Stage::ProposePatch, patch_prompt(corpus, facts, report))
            .await?;
        let value = parse_json_object(Stage::ProposePatch, &text)?;
        parse_patch(&value)
    }
}
