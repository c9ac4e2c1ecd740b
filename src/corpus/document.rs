// Converted document types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Source format of a converted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Text,
    Markdown,
    Html,
    Csv,
    Tsv,
}

impl DocumentType {
    /// Map a file extension (case-insensitive) to a supported type.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path relative to the corpus root (or the bare name for in-memory text)
    pub path: PathBuf,
    pub document_type: DocumentType,
    pub page_count: usize,
    /// How the text was obtained, e.g. "plain_text", "html_text", "csv_rows"
    pub extraction_method: String,
    pub char_count: usize,
}

/// Plain text plus metadata, the output of a converter
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl ConvertedDocument {
    pub fn new(
        path: impl Into<PathBuf>,
        document_type: DocumentType,
        text: String,
        page_count: usize,
        extraction_method: &str,
    ) -> Self {
        let char_count = text.chars().count();
        Self {
            text,
            metadata: DocumentMetadata {
                path: path.into(),
                document_type,
                page_count,
                extraction_method: extraction_method.to_string(),
                char_count,
            },
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
