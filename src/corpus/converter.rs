// File converters
//
// Turn a source file into plain text the extractor can read. Conversion is
// local and deterministic, so it runs synchronously and is not retried.

use scraper::{ElementRef, Html, Node};
use std::fs;
use std::path::Path;

use super::document::{ConvertedDocument, DocumentType};
use crate::collaborators::{CollaboratorError, Stage};

/// Form feed separates pages in plain-text exports.
const PAGE_BREAK: char = '\u{0C}';

/// Elements whose text is never document content
const SKIPPED_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Capability: convert one document into text plus metadata
pub trait Converter: Send + Sync {
    /// Whether this converter handles the file at `path`
    fn supports(&self, path: &Path) -> bool;

    /// Convert `path`. `display_path` is recorded in the metadata.
    fn convert(&self, path: &Path, display_path: &Path)
        -> Result<ConvertedDocument, CollaboratorError>;
}

/// Converter for the text-like formats: plain text, markdown, HTML, CSV and TSV
#[derive(Debug, Clone, Copy, Default)]
pub struct FileConverter;

impl FileConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Converter for FileConverter {
    fn supports(&self, path: &Path) -> bool {
        DocumentType::from_path(path).is_some()
    }

    fn convert(
        &self,
        path: &Path,
        display_path: &Path,
    ) -> Result<ConvertedDocument, CollaboratorError> {
        let document_type = DocumentType::from_path(path).ok_or_else(|| {
            CollaboratorError::invalid_response(
                Stage::Convert,
                format!("unsupported document type: {}", path.display()),
            )
        })?;

        let raw = fs::read(path).map_err(|e| {
            CollaboratorError::transport(
                Stage::Convert,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        // Lossy decoding keeps mostly-UTF-8 exports usable
        let content = String::from_utf8_lossy(&raw);

        let (text, pages, method) = match document_type {
            DocumentType::Text | DocumentType::Markdown => {
                let (text, pages) = plain_text(&content);
                (text, pages, "plain_text")
            }
            DocumentType::Html => (html_text(&content), 1, "html_text"),
            DocumentType::Csv => (delimited_text(&content, b',', path)?, 1, "csv_rows"),
            DocumentType::Tsv => (delimited_text(&content, b'\t', path)?, 1, "tsv_rows"),
        };

        Ok(ConvertedDocument::new(
            display_path,
            document_type,
            text,
            pages,
            method,
        ))
    }
}

/// Normalise line endings and count form-feed separated pages.
fn plain_text(content: &str) -> (String, usize) {
    let normalised = content.replace("\r\n", "\n");
    let pages = normalised
        .split(PAGE_BREAK)
        .filter(|page| !page.trim().is_empty())
        .count()
        .max(1);
    let text = normalised.replace(PAGE_BREAK, "\n\n");
    (text.trim().to_string(), pages)
}

/// Visible text of an HTML document, one block per line.
fn html_text(content: &str) -> String {
    let document = Html::parse_document(content);
    let mut lines = Vec::new();
    let mut current = String::new();
    collect_text(document.root_element(), &mut current, &mut lines);
    flush_line(&mut current, &mut lines);
    lines.join("\n")
}

fn collect_text(element: ElementRef, current: &mut String, lines: &mut Vec<String>) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    let block = is_block(name);
    if block {
        flush_line(current, lines);
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let words = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !words.is_empty() {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&words);
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, current, lines);
                }
            }
            _ => {}
        }
    }

    if block {
        flush_line(current, lines);
    }
}

fn flush_line(current: &mut String, lines: &mut Vec<String>) {
    let line = current.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
    current.clear();
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "br"
            | "li"
            | "tr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "blockquote"
            | "pre"
            | "table"
            | "ul"
            | "ol"
            | "dt"
            | "dd"
    )
}

/// Render each record as `header: value` lines, records separated by a blank line.
fn delimited_text(content: &str, delimiter: u8, path: &Path) -> Result<String, CollaboratorError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let parse_error = |e: csv::Error| {
        CollaboratorError::invalid_response(
            Stage::Convert,
            format!("failed to parse {}: {e}", path.display()),
        )
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(parse_error)?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(col, value)| {
                let header = headers
                    .get(col)
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", col + 1));
                format!("{header}: {}", value.trim())
            })
            .collect();
        if !lines.is_empty() {
            records.push(format!("[row {}]\n{}", row + 1, lines.join("\n")));
        }
    }

    Ok(records.join("\n\n"))
}
