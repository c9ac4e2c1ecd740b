// Prompt templates for the three model-backed stages
//
// Each template states the exact JSON shape expected back; the response
// parsers in `response.rs` enforce the same shape.

use crate::corpus::Corpus;
use crate::facts::{CoverageReport, FactCategory, FactSet};

/// System prompt shared by every stage
pub const SYSTEM_PROMPT: &str = "You are a meticulous fact-extraction analyst. \
You read source documents and produce structured, attributed facts. \
You only state what the documents support. \
You always answer with a single JSON object and nothing else: \
no markdown fences, no commentary.";

const FACT_SHAPE: &str = r#"{
  "id": "fact_001",
  "text": "one atomic statement",
  "source": "document name it came from",
  "confidence": 0.0-1.0,
  "category": "CATEGORY",
  "context": "short surrounding context or location in the document",
  "extraction_method": "how the fact was found (e.g. explicit_statement, table, inference)"
}"#;

fn category_list() -> String {
    FactCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the fact list with the snapshot index each fact sits at.
fn indexed_facts(facts: &FactSet) -> String {
    if facts.is_empty() {
        return "(no facts yet)".to_string();
    }
    facts
        .extracted_facts
        .iter()
        .enumerate()
        .map(|(i, f)| {
            format!(
                "[{i}] {} ({}, confidence {:.2}, source: {}) {}",
                f.id, f.category, f.confidence, f.source, f.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn extraction_prompt(corpus: &Corpus) -> String {
    format!(
        "Extract every distinct, verifiable fact from the documents below.\n\n\
         Rules:\n\
         - One atomic statement per fact; split compound sentences.\n\
         - Attribute each fact to the document it came from.\n\
         - Categories: {categories}.\n\
         - Number ids sequentially: fact_001, fact_002, ...\n\n\
         Each fact has this shape:\n{fact_shape}\n\n\
         Return exactly:\n\
         {{\"extracted_facts\": [<fact>, ...], \"extraction_metadata\": {{\"total_documents\": {docs}}}}}\n\n\
         ---\n\n{text}",
        categories = category_list(),
        fact_shape = FACT_SHAPE,
        docs = corpus.document_count(),
        text = corpus.text(),
    )
}

pub fn assessment_prompt(corpus: &Corpus, facts: &FactSet) -> String {
    format!(
        "Compare the extracted facts against the source documents and report coverage gaps.\n\n\
         - missing_facts: important facts stated in the documents but absent from the list.\n\
         - incorrect_facts: listed facts that misstate the documents (cite the fact id).\n\
         - recommendations: anything else that would improve the list.\n\
         If the list is complete and correct, return empty missing_facts and incorrect_facts.\n\n\
         Return exactly:\n\
         {{\"coverage_analysis\": {{\"missing_facts\": [\"...\"], \"incorrect_facts\": [\"...\"], \"recommendations\": [\"...\"]}}}}\n\n\
         Extracted facts:\n{facts}\n\n\
         ---\n\n{text}",
        facts = indexed_facts(facts),
        text = corpus.text(),
    )
}

pub fn patch_prompt(corpus: &Corpus, facts: &FactSet, report: &CoverageReport) -> String {
    format!(
        "Produce a JSON Patch (RFC 6902 subset) that fixes the gaps listed below.\n\n\
         Allowed operations:\n\
         - {{\"op\": \"add\", \"path\": \"/extracted_facts/-\", \"value\": <fact>}} to append a missing fact\n\
         - {{\"op\": \"replace\", \"path\": \"/extracted_facts/<index>/<field>\", \"value\": <new value>}}\n\
           where field is one of text, source, confidence, category, context, extraction_method\n\
         - {{\"op\": \"remove\", \"path\": \"/extracted_facts/<index>\"}}\n\n\
         Index rules: every <index> is the bracketed number shown in the fact list below, \
         i.e. the position BEFORE any of your operations are applied. \
         Never target the same index again after removing it. \
         To correct a fact wholesale, remove it and add a corrected fact.\n\n\
         New facts use this shape (omit \"id\" to have one assigned):\n{fact_shape}\n\
         Categories: {categories}.\n\n\
         Return exactly: {{\"patch\": [<operation>, ...]}}\n\n\
         Missing facts:\n{missing}\n\n\
         Incorrect facts:\n{incorrect}\n\n\
         Recommendations:\n{recommendations}\n\n\
         Current facts:\n{facts}\n\n\
         ---\n\n{text}",
        fact_shape = FACT_SHAPE,
        categories = category_list(),
        missing = bullet_list(&report.missing_facts),
        incorrect = bullet_list(&report.incorrect_facts),
        recommendations = bullet_list(&report.recommendations),
        facts = indexed_facts(facts),
        text = corpus.text(),
    )
}
