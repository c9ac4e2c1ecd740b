// Document corpus
//
// A corpus is the converted text of every supported file under a directory,
// joined in a stable order so prompts and digests are reproducible.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod converter;
pub mod document;

pub use converter::{Converter, FileConverter};
pub use document::{ConvertedDocument, DocumentMetadata, DocumentType};

use crate::collaborators::{CollaboratorError, Stage};
use crate::errors::{ConfigError, RunError};

/// Immutable input to a refinement run
#[derive(Debug, Clone)]
pub struct Corpus {
    name: String,
    documents: Vec<DocumentMetadata>,
    text: String,
    digest: String,
}

impl Corpus {
    /// Convert every supported file under `dir`, walking in sorted order.
    ///
    /// Unsupported files and documents without text are skipped with a
    /// warning. A directory that yields no text is [`ConfigError::EmptyCorpus`].
    pub fn from_dir(dir: &Path, converter: &dyn Converter) -> Result<Self, RunError> {
        if !dir.is_dir() {
            return Err(CollaboratorError::transport(
                Stage::Convert,
                format!("corpus directory not found: {}", dir.display()),
            )
            .into());
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                CollaboratorError::transport(Stage::Convert, format!("failed to walk corpus: {e}"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(dir).unwrap_or(path);
            if !converter.supports(path) {
                tracing::warn!("Skipping unsupported file {}", relative.display());
                continue;
            }

            let document = converter.convert(path, relative)?;
            tracing::debug!(
                "Converted {} ({}, {} chars)",
                relative.display(),
                document.metadata.document_type,
                document.metadata.char_count
            );
            documents.push(document);
        }

        Self::from_documents(display_name(dir), documents).map_err(RunError::from)
    }

    /// Assemble a corpus from already converted documents.
    pub fn from_documents(
        name: impl Into<String>,
        documents: Vec<ConvertedDocument>,
    ) -> Result<Self, ConfigError> {
        let mut sections = Vec::new();
        let mut metadata = Vec::new();
        for document in documents {
            if document.is_blank() {
                tracing::warn!(
                    "Skipping {} (no text extracted)",
                    document.metadata.path.display()
                );
                continue;
            }
            sections.push(format!(
                "=== DOCUMENT: {} ===\n{}",
                document.metadata.path.display(),
                document.text.trim()
            ));
            metadata.push(document.metadata);
        }

        if metadata.is_empty() {
            return Err(ConfigError::EmptyCorpus);
        }

        Ok(Self::assemble(name.into(), metadata, sections.join("\n\n")))
    }

    /// Single in-memory document, mostly for tests and piping text in.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let text = text.into();
        let document = ConvertedDocument::new(
            PathBuf::from(&name),
            DocumentType::Text,
            text.clone(),
            1,
            "inline",
        );
        Self::assemble(name, vec![document.metadata], text)
    }

    fn assemble(name: String, documents: Vec<DocumentMetadata>, text: String) -> Self {
        let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
        Self {
            name,
            documents,
            text,
            digest,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn documents(&self) -> &[DocumentMetadata] {
        &self.documents
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Hex SHA-256 of the combined text
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn display_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}
