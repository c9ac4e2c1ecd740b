// Fact, FactSet, CoverageReport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix for sequential fact ids (`fact_001`, `fact_002`, ...)
pub const FACT_ID_PREFIX: &str = "fact_";

/// Why a fact value failed validation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FactError {
    #[error("fact value is not valid JSON: {0}")]
    Malformed(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("field '{field}' has the wrong type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("duplicate fact id '{0}'")]
    DuplicateId(String),

    #[error("no fact id follows sequence number {0}")]
    IdSequenceExhausted(u64),
}

/// Category of an extracted fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactCategory {
    Person,
    Organization,
    Event,
    Financial,
    Technical,
    Temporal,
    Location,
    Other,
}

impl FactCategory {
    pub const ALL: [FactCategory; 8] = [
        FactCategory::Person,
        FactCategory::Organization,
        FactCategory::Event,
        FactCategory::Financial,
        FactCategory::Technical,
        FactCategory::Temporal,
        FactCategory::Location,
        FactCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactCategory::Person => "person",
            FactCategory::Organization => "organization",
            FactCategory::Event => "event",
            FactCategory::Financial => "financial",
            FactCategory::Technical => "technical",
            FactCategory::Temporal => "temporal",
            FactCategory::Location => "location",
            FactCategory::Other => "other",
        }
    }
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactCategory {
    type Err = FactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        FactCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| FactError::UnknownCategory(s.to_string()))
    }
}

/// A single attributed statement extracted from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub text: String,
    pub source: String,
    pub confidence: f64,
    pub category: FactCategory,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub extraction_method: String,
}

impl Fact {
    /// Check field-level invariants (non-empty text/source/id, confidence range).
    pub fn validate(&self) -> Result<(), FactError> {
        if self.id.trim().is_empty() {
            return Err(FactError::EmptyField("id"));
        }
        if self.text.trim().is_empty() {
            return Err(FactError::EmptyField("text"));
        }
        if self.source.trim().is_empty() {
            return Err(FactError::EmptyField("source"));
        }
        check_confidence(self.confidence)
    }

    /// Numeric part of a `fact_NNN` id, if the id follows the sequence format.
    pub fn sequence_number(&self) -> Option<u64> {
        sequence_number(&self.id)
    }
}

fn sequence_number(id: &str) -> Option<u64> {
    id.strip_prefix(FACT_ID_PREFIX)?.parse().ok()
}

pub(crate) fn check_confidence(confidence: f64) -> Result<(), FactError> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(FactError::ConfidenceOutOfRange(confidence))
    }
}

/// Loosely-typed fact as produced by a model.
///
/// Models sometimes omit the id, send confidence as a string, or encode the
/// whole object as a JSON string. `RawFact::from_value` absorbs those quirks;
/// `into_fact` applies the strict checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFact {
    pub id: Option<String>,
    pub text: Option<String>,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub category: Option<String>,
    pub context: Option<String>,
    pub extraction_method: Option<String>,
}

impl RawFact {
    /// Parse a JSON value (native object or JSON-encoded string) into a RawFact.
    pub fn from_value(value: &Value) -> Result<Self, FactError> {
        let decoded;
        let object = match value {
            Value::Object(map) => map,
            Value::String(s) => {
                decoded = serde_json::from_str::<Value>(s)
                    .map_err(|e| FactError::Malformed(e.to_string()))?;
                match &decoded {
                    Value::Object(map) => map,
                    _ => return Err(FactError::Malformed("expected a JSON object".to_string())),
                }
            }
            _ => return Err(FactError::Malformed("expected a JSON object".to_string())),
        };

        let string_field = |name: &'static str| -> Result<Option<String>, FactError> {
            match object.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(FactError::WrongType {
                    field: name,
                    expected: "string",
                }),
            }
        };

        let confidence = match object.get("confidence") {
            None | Some(Value::Null) => None,
            Some(v) => Some(confidence_from_value(v)?),
        };

        Ok(Self {
            id: string_field("id")?,
            text: string_field("text")?,
            source: string_field("source")?,
            confidence,
            category: string_field("category")?,
            context: string_field("context")?,
            extraction_method: string_field("extraction_method")?,
        })
    }

    /// Build a validated Fact. `fallback_id` is used when the raw id is absent or blank.
    pub fn into_fact(
        self,
        fallback_id: impl FnOnce() -> Result<String, FactError>,
    ) -> Result<Fact, FactError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => fallback_id()?,
        };
        let text = self.text.ok_or(FactError::MissingField("text"))?;
        let source = self.source.ok_or(FactError::MissingField("source"))?;
        let confidence = self.confidence.ok_or(FactError::MissingField("confidence"))?;
        let category: FactCategory = self
            .category
            .ok_or(FactError::MissingField("category"))?
            .parse()?;

        let fact = Fact {
            id,
            text,
            source,
            confidence,
            category,
            context: self.context.unwrap_or_default(),
            extraction_method: self.extraction_method.unwrap_or_default(),
        };
        fact.validate()?;
        Ok(fact)
    }

    /// Sequence number of the raw id, when it is a `fact_NNN` id
    pub fn sequence_number(&self) -> Option<u64> {
        sequence_number(self.id.as_deref()?.trim())
    }

    /// True when the raw value carried a usable id of its own
    pub fn has_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }
}

/// Accept a number or a numeric string for confidence.
pub(crate) fn confidence_from_value(value: &Value) -> Result<f64, FactError> {
    let confidence = match value {
        Value::Number(n) => n.as_f64().ok_or(FactError::WrongType {
            field: "confidence",
            expected: "number",
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| FactError::WrongType {
            field: "confidence",
            expected: "number",
        })?,
        _ => {
            return Err(FactError::WrongType {
                field: "confidence",
                expected: "number",
            })
        }
    };
    check_confidence(confidence)?;
    Ok(confidence)
}

/// Provenance of a FactSet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub total_documents: usize,
    pub extraction_timestamp: DateTime<Utc>,
    pub model_used: String,
}

impl ExtractionMetadata {
    pub fn new(total_documents: usize, model_used: impl Into<String>) -> Self {
        Self {
            total_documents,
            extraction_timestamp: Utc::now(),
            model_used: model_used.into(),
        }
    }
}

/// Ordered collection of facts plus extraction metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    pub extracted_facts: Vec<Fact>,
    pub extraction_metadata: ExtractionMetadata,
}

impl FactSet {
    pub fn new(extracted_facts: Vec<Fact>, extraction_metadata: ExtractionMetadata) -> Self {
        Self {
            extracted_facts,
            extraction_metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.extracted_facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extracted_facts.is_empty()
    }

    pub fn facts(&self) -> &[Fact] {
        &self.extracted_facts
    }

    /// Current position of the fact with the given id
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.extracted_facts.iter().position(|f| f.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.position_of(id).is_some()
    }

    /// Next id in the `fact_NNN` sequence, above every current id and above
    /// `floor`. Gaps left by removals are not reused.
    pub fn next_fact_id(&self, floor: u64) -> Result<String, FactError> {
        let highest = self
            .extracted_facts
            .iter()
            .filter_map(Fact::sequence_number)
            .max()
            .unwrap_or(0)
            .max(floor);
        let next = highest
            .checked_add(1)
            .ok_or(FactError::IdSequenceExhausted(highest))?;
        Ok(format!("{FACT_ID_PREFIX}{next:03}"))
    }

    /// First id that occurs more than once, if any
    pub fn first_duplicate_id(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.extracted_facts.len());
        self.extracted_facts
            .iter()
            .map(|f| f.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    /// Check every fact and id uniqueness.
    pub fn validate(&self) -> Result<(), FactError> {
        let mut seen = HashSet::with_capacity(self.extracted_facts.len());
        for fact in &self.extracted_facts {
            fact.validate()?;
            if !seen.insert(fact.id.as_str()) {
                return Err(FactError::DuplicateId(fact.id.clone()));
            }
        }
        Ok(())
    }
}

/// Gap report produced by the coverage assessor. Fresh each iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    #[serde(default)]
    pub missing_facts: Vec<String>,
    #[serde(default)]
    pub incorrect_facts: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl CoverageReport {
    /// Number of outstanding gaps (missing + incorrect)
    pub fn gap_count(&self) -> usize {
        self.missing_facts.len() + self.incorrect_facts.len()
    }

    pub fn has_gaps(&self) -> bool {
        self.gap_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fact(id: &str) -> Fact {
        Fact {
            id: id.to_string(),
            text: "Acme Corp was founded in 1999".to_string(),
            source: "report.txt".to_string(),
            confidence: 0.9,
            category: FactCategory::Organization,
            context: "page 1".to_string(),
            extraction_method: "llm".to_string(),
        }
    }

    fn set(ids: &[&str]) -> FactSet {
        FactSet::new(
            ids.iter().map(|id| fact(id)).collect(),
            ExtractionMetadata::new(1, "test-model"),
        )
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("Financial".parse::<FactCategory>().unwrap(), FactCategory::Financial);
        assert_eq!(" person ".parse::<FactCategory>().unwrap(), FactCategory::Person);
        assert!(matches!(
            "weather".parse::<FactCategory>(),
            Err(FactError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_next_fact_id_continues_sequence_past_gaps() {
        let facts = set(&["fact_001", "fact_004", "fact_002"]);
        assert_eq!(facts.next_fact_id(0).unwrap(), "fact_005");
        assert_eq!(facts.next_fact_id(9).unwrap(), "fact_010");
    }

    #[test]
    fn test_next_fact_id_ignores_foreign_ids() {
        let facts = set(&["custom", "fact_x"]);
        assert_eq!(facts.next_fact_id(0).unwrap(), "fact_001");
    }

    #[test]
    fn test_next_fact_id_at_end_of_sequence() {
        let last = format!("fact_{}", u64::MAX);
        let facts = set(&[last.as_str()]);
        assert_eq!(
            facts.next_fact_id(0),
            Err(FactError::IdSequenceExhausted(u64::MAX))
        );
        assert!(set(&[]).next_fact_id(u64::MAX).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let facts = set(&["fact_001", "fact_001"]);
        assert_eq!(
            facts.validate(),
            Err(FactError::DuplicateId("fact_001".to_string()))
        );
    }

    #[test]
    fn test_raw_fact_from_string_encoded_object() {
        let encoded = json!(
            "{\"text\":\"Revenue was $5M\",\"source\":\"q3.md\",\"confidence\":0.8,\"category\":\"financial\"}"
        );
        let raw = RawFact::from_value(&encoded).unwrap();
        assert!(!raw.has_id());
        let fact = raw.into_fact(|| Ok("fact_010".to_string())).unwrap();
        assert_eq!(fact.id, "fact_010");
        assert_eq!(fact.category, FactCategory::Financial);
        assert_eq!(fact.context, "");
    }

    #[test]
    fn test_raw_fact_accepts_numeric_string_confidence() {
        let value = json!({
            "id": "fact_003", "text": "t", "source": "s",
            "confidence": "0.25", "category": "event"
        });
        let fact = RawFact::from_value(&value)
            .unwrap()
            .into_fact(|| unreachable!())
            .unwrap();
        assert!((fact.confidence - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_raw_fact_rejects_out_of_range_confidence() {
        let value = json!({"text": "t", "source": "s", "confidence": 1.5, "category": "event"});
        assert_eq!(
            RawFact::from_value(&value).unwrap_err(),
            FactError::ConfidenceOutOfRange(1.5)
        );
    }

    #[test]
    fn test_raw_fact_missing_category() {
        let value = json!({"text": "t", "source": "s", "confidence": 0.5});
        let err = RawFact::from_value(&value)
            .unwrap()
            .into_fact(|| Ok("fact_001".to_string()))
            .unwrap_err();
        assert_eq!(err, FactError::MissingField("category"));
    }

    #[test]
    fn test_raw_fact_rejects_non_object() {
        assert!(matches!(
            RawFact::from_value(&json!(42)),
            Err(FactError::Malformed(_))
        ));
        assert!(matches!(
            RawFact::from_value(&json!("not json")),
            Err(FactError::Malformed(_))
        ));
    }

    #[test]
    fn test_coverage_report_gaps() {
        let mut report = CoverageReport::default();
        assert!(!report.has_gaps());
        report.recommendations.push("look at appendix".to_string());
        assert!(!report.has_gaps());
        report.incorrect_facts.push("fact_002 misstates the year".to_string());
        assert_eq!(report.gap_count(), 1);
    }

    #[test]
    fn test_fact_set_serializes_with_wire_field_names() {
        let value = serde_json::to_value(set(&["fact_001"])).unwrap();
        assert!(value["extracted_facts"].is_array());
        assert_eq!(value["extracted_facts"][0]["category"], "organization");
        assert_eq!(value["extraction_metadata"]["total_documents"], 1);
    }
}
