// Parsing and validation of model responses
//
// Models are asked for bare JSON but sometimes wrap it in markdown fences or
// surround it with prose. Unparseable text is an InvalidResponse; JSON that
// does not match the stage's schema is a SchemaViolation.

use serde_json::Value;

use super::{CollaboratorError, Stage};
use crate::facts::{CoverageReport, ExtractionMetadata, FactSet, RawFact};
use crate::patch::RawPatchOp;

/// Strip leading/trailing markdown code fences (```json ... ``` or ``` ... ```)
pub fn strip_markdown_fences(s: &str) -> &str {
    let s = s.trim();
    let s = if let Some(rest) = s.strip_prefix("```json") {
        rest
    } else if let Some(rest) = s.strip_prefix("```") {
        rest
    } else {
        s
    };
    if let Some(rest) = s.strip_suffix("```") {
        rest.trim()
    } else {
        s.trim()
    }
}

/// Pull the JSON object out of a model response.
pub fn parse_json_object(stage: Stage, text: &str) -> Result<Value, CollaboratorError> {
    let stripped = strip_markdown_fences(text);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(stripped) {
        return Ok(value);
    }

    // Fall back to the outermost {...} slice
    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
        if start < end {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&stripped[start..=end]) {
                return Ok(value);
            }
        }
    }

    let preview: String = stripped.chars().take(120).collect();
    Err(CollaboratorError::invalid_response(
        stage,
        format!("response is not a JSON object: {preview:?}"),
    ))
}

/// Validate an extractor response: `{ extracted_facts: [Fact], extraction_metadata: {...} }`.
///
/// Metadata is always rebuilt locally; missing fact ids are assigned in order,
/// continuing after the highest explicit id.
pub fn parse_extraction(
    value: &Value,
    total_documents: usize,
    model_used: &str,
) -> Result<FactSet, CollaboratorError> {
    let stage = Stage::Extract;
    let items = value
        .get("extracted_facts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            CollaboratorError::schema_violation(stage, "missing 'extracted_facts' array")
        })?;

    let raw: Vec<RawFact> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            RawFact::from_value(item).map_err(|e| {
                CollaboratorError::schema_violation(stage, format!("extracted_facts[{i}]: {e}"))
            })
        })
        .collect::<Result<_, _>>()?;

    // Ids assigned to id-less facts continue after the highest explicit one
    let floor = raw
        .iter()
        .filter_map(RawFact::sequence_number)
        .max()
        .unwrap_or(0);

    let mut facts = FactSet::new(
        Vec::with_capacity(raw.len()),
        ExtractionMetadata::new(total_documents, model_used),
    );
    for (i, item) in raw.into_iter().enumerate() {
        let fact = item
            .into_fact(|| facts.next_fact_id(floor))
            .map_err(|e| {
                CollaboratorError::schema_violation(stage, format!("extracted_facts[{i}]: {e}"))
            })?;
        if facts.contains_id(&fact.id) {
            return Err(CollaboratorError::schema_violation(
                stage,
                format!("duplicate fact id '{}'", fact.id),
            ));
        }
        facts.extracted_facts.push(fact);
    }

    Ok(facts)
}

/// Validate an assessor response: `{ coverage_analysis: { missing_facts, incorrect_facts, recommendations } }`.
pub fn parse_assessment(value: &Value) -> Result<CoverageReport, CollaboratorError> {
    let stage = Stage::Assess;
    let analysis = value
        .get("coverage_analysis")
        .filter(|v| v.is_object())
        .ok_or_else(|| {
            CollaboratorError::schema_violation(stage, "missing 'coverage_analysis' object")
        })?;

    let list = |field: &str| -> Result<Vec<String>, CollaboratorError> {
        match analysis.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        CollaboratorError::schema_violation(
                            stage,
                            format!("'{field}' must contain only strings"),
                        )
                    })
                })
                .collect(),
            Some(_) => Err(CollaboratorError::schema_violation(
                stage,
                format!("'{field}' must be an array"),
            )),
        }
    };

    Ok(CoverageReport {
        missing_facts: list("missing_facts")?,
        incorrect_facts: list("incorrect_facts")?,
        recommendations: list("recommendations")?,
    })
}

/// Validate a patch generator response: `{ patch: [{op, path, value?}] }`.
///
/// Only the envelope shape is checked here; operation semantics are the
/// applier's job.
pub fn parse_patch(value: &Value) -> Result<Vec<RawPatchOp>, CollaboratorError> {
    let stage = Stage::ProposePatch;
    let items = value
        .get("patch")
        .and_then(Value::as_array)
        .ok_or_else(|| CollaboratorError::schema_violation(stage, "missing 'patch' array"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<RawPatchOp>(item.clone()).map_err(|e| {
                CollaboratorError::schema_violation(stage, format!("patch[{i}]: {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorErrorKind;
    use serde_json::json;

    #[test]
    fn test_strip_markdown_fences_json() {
        let s = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_markdown_fences(s), "{\"a\":1}");
    }

    #[test]
    fn test_strip_markdown_fences_no_fences() {
        assert_eq!(strip_markdown_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_object_with_surrounding_prose() {
        let text = "Here is the analysis:\n{\"coverage_analysis\": {}}\nLet me know.";
        let value = parse_json_object(Stage::Assess, text).unwrap();
        assert!(value.get("coverage_analysis").is_some());
    }

    #[test]
    fn test_parse_json_object_rejects_plain_text() {
        let err = parse_json_object(Stage::Assess, "I could not read the document.").unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_json_object_rejects_bare_array() {
        let err = parse_json_object(Stage::ProposePatch, "[]").unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_extraction_assigns_missing_ids_after_explicit_ones() {
        let value = json!({
            "extracted_facts": [
                {"id": "fact_002", "text": "a", "source": "x.md", "confidence": 0.9, "category": "person"},
                {"text": "b", "source": "x.md", "confidence": 0.5, "category": "event"},
            ],
            "extraction_metadata": {"total_documents": 99}
        });
        let facts = parse_extraction(&value, 2, "model-x").unwrap();
        assert_eq!(facts.extracted_facts[0].id, "fact_002");
        assert_eq!(facts.extracted_facts[1].id, "fact_003");
        assert_eq!(facts.extraction_metadata.total_documents, 2);
        assert_eq!(facts.extraction_metadata.model_used, "model-x");
    }

    #[test]
    fn test_parse_extraction_rejects_duplicate_ids() {
        let value = json!({
            "extracted_facts": [
                {"id": "fact_001", "text": "a", "source": "s", "confidence": 0.9, "category": "person"},
                {"id": "fact_001", "text": "b", "source": "s", "confidence": 0.9, "category": "person"},
            ]
        });
        let err = parse_extraction(&value, 1, "m").unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::SchemaViolation);
    }

    #[test]
    fn test_parse_extraction_rejects_exhausted_id_sequence() {
        let value = json!({
            "extracted_facts": [
                {"id": format!("fact_{}", u64::MAX), "text": "a", "source": "s", "confidence": 0.9, "category": "person"},
                {"text": "b", "source": "s", "confidence": 0.9, "category": "person"},
            ]
        });
        let err = parse_extraction(&value, 1, "m").unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::SchemaViolation);
        assert!(err.message.contains("extracted_facts[1]"));
    }

    #[test]
    fn test_parse_extraction_rejects_bad_fact() {
        let value = json!({
            "extracted_facts": [
                {"text": "a", "source": "s", "confidence": 3, "category": "person"}
            ]
        });
        let err = parse_extraction(&value, 1, "m").unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::SchemaViolation);
        assert!(err.message.contains("extracted_facts[0]"));
    }

    #[test]
    fn test_parse_assessment_defaults_missing_lists() {
        let value = json!({"coverage_analysis": {"missing_facts": ["CEO name"]}});
        let report = parse_assessment(&value).unwrap();
        assert_eq!(report.missing_facts, vec!["CEO name".to_string()]);
        assert!(report.incorrect_facts.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_parse_assessment_rejects_wrong_shape() {
        let err = parse_assessment(&json!({"missing_facts": []})).unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::SchemaViolation);

        let err = parse_assessment(&json!({"coverage_analysis": {"incorrect_facts": [1, 2]}}))
            .unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::SchemaViolation);
    }

    #[test]
    fn test_parse_patch_keeps_string_encoded_values() {
        let value = json!({
            "patch": [
                {"op": "add", "path": "/extracted_facts/-", "value": "{\"text\":\"t\"}"},
                {"op": "remove", "path": "/extracted_facts/0"}
            ]
        });
        let ops = parse_patch(&value).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].value, Some(json!("{\"text\":\"t\"}")));
        assert_eq!(ops[1].value, None);
    }

    #[test]
    fn test_parse_patch_rejects_op_without_path() {
        let err = parse_patch(&json!({"patch": [{"op": "remove"}]})).unwrap_err();
        assert_eq!(err.kind, CollaboratorErrorKind::SchemaViolation);
    }
}
