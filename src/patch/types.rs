// Patch wire format and validated operations

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::errors::PatchError;
use crate::facts::types::{confidence_from_value, FactError};
use crate::facts::{Fact, FactCategory, RawFact};

/// Root of the array every patch path addresses
pub const FACTS_POINTER: &str = "/extracted_facts";

/// One operation exactly as the patch generator produced it.
///
/// `value` is kept untouched (including string-encoded fact objects) so the
/// audit trail records what was actually proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPatchOp {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl RawPatchOp {
    pub fn add(value: Value) -> Self {
        Self {
            op: "add".to_string(),
            path: format!("{FACTS_POINTER}/-"),
            value: Some(value),
        }
    }

    pub fn replace(index: usize, field: &str, value: Value) -> Self {
        Self {
            op: "replace".to_string(),
            path: format!("{FACTS_POINTER}/{index}/{field}"),
            value: Some(value),
        }
    }

    pub fn remove(index: usize) -> Self {
        Self {
            op: "remove".to_string(),
            path: format!("{FACTS_POINTER}/{index}"),
            value: None,
        }
    }
}

/// `{ "patch": [...] }` envelope returned by the patch generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchDocument {
    pub patch: Vec<RawPatchOp>,
}

impl PatchDocument {
    /// Parse a stored patch: either the `{ "patch": [...] }` envelope or a bare array.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s).context("Patch file is not valid JSON")?;
        if value.is_array() {
            let patch = serde_json::from_value(value).context("Patch array has the wrong shape")?;
            Ok(Self { patch })
        } else {
            serde_json::from_value(value).context("Patch file has the wrong shape")
        }
    }
}

/// Fact fields addressable by `replace`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactField {
    Id,
    Text,
    Source,
    Confidence,
    Category,
    Context,
    ExtractionMethod,
}

impl FactField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactField::Id => "id",
            FactField::Text => "text",
            FactField::Source => "source",
            FactField::Confidence => "confidence",
            FactField::Category => "category",
            FactField::Context => "context",
            FactField::ExtractionMethod => "extraction_method",
        }
    }

}

impl FromStr for FactField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "id" => FactField::Id,
            "text" => FactField::Text,
            "source" => FactField::Source,
            "confidence" => FactField::Confidence,
            "category" => FactField::Category,
            "context" => FactField::Context,
            "extraction_method" => FactField::ExtractionMethod,
            _ => return Err(()),
        })
    }
}

/// A typed, already-validated new value for one fact field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Text(String),
    Source(String),
    Confidence(f64),
    Category(FactCategory),
    Context(String),
    ExtractionMethod(String),
}

impl FieldUpdate {
    /// Typed update for `field`. `id` is never replaceable.
    fn parse(op: usize, field: FactField, value: Option<&Value>) -> Result<Self, PatchError> {
        let schema = |source: FactError| PatchError::InvalidFactSchema { op, source };
        let present = || value.ok_or_else(|| schema(FactError::MissingField("value")));

        let text = |name: &'static str, required: bool| -> Result<String, PatchError> {
            let s = present()?.as_str().ok_or_else(|| {
                schema(FactError::WrongType {
                    field: name,
                    expected: "string",
                })
            })?;
            if required && s.trim().is_empty() {
                return Err(schema(FactError::EmptyField(name)));
            }
            Ok(s.to_string())
        };

        Ok(match field {
            FactField::Id => {
                return Err(PatchError::ImmutableField {
                    op,
                    field: field.as_str().to_string(),
                })
            }
            FactField::Text => FieldUpdate::Text(text("text", true)?),
            FactField::Source => FieldUpdate::Source(text("source", true)?),
            FactField::Context => FieldUpdate::Context(text("context", false)?),
            FactField::ExtractionMethod => {
                FieldUpdate::ExtractionMethod(text("extraction_method", false)?)
            }
            FactField::Confidence => {
                FieldUpdate::Confidence(confidence_from_value(present()?).map_err(schema)?)
            }
            FactField::Category => {
                FieldUpdate::Category(text("category", true)?.parse().map_err(schema)?)
            }
        })
    }

    /// Produce a copy of `fact` with this field replaced
    pub fn applied_to(&self, fact: &Fact) -> Fact {
        let mut next = fact.clone();
        match self {
            FieldUpdate::Text(v) => next.text = v.clone(),
            FieldUpdate::Source(v) => next.source = v.clone(),
            FieldUpdate::Confidence(v) => next.confidence = *v,
            FieldUpdate::Category(v) => next.category = *v,
            FieldUpdate::Context(v) => next.context = v.clone(),
            FieldUpdate::ExtractionMethod(v) => next.extraction_method = v.clone(),
        }
        next
    }
}

/// Validated patch operation. Indices refer to the pre-patch snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    Add { fact: RawFact },
    Replace { index: usize, update: FieldUpdate },
    Remove { index: usize },
}

impl PatchOp {
    /// Validate one wire operation. `op` is its position within the patch.
    pub fn parse(op: usize, raw: &RawPatchOp) -> Result<Self, PatchError> {
        let invalid_path = |reason: &str| PatchError::InvalidPath {
            op,
            path: raw.path.clone(),
            reason: reason.to_string(),
        };
        let segments = || {
            split_facts_path(&raw.path)
                .ok_or_else(|| invalid_path("paths must address /extracted_facts"))
        };

        match raw.op.as_str() {
            "add" => {
                if segments()? != ["-"] {
                    return Err(invalid_path("add only appends via /extracted_facts/-"));
                }
                let value = raw.value.as_ref().ok_or(PatchError::InvalidFactSchema {
                    op,
                    source: FactError::MissingField("value"),
                })?;
                let fact = RawFact::from_value(value)
                    .map_err(|source| PatchError::InvalidFactSchema { op, source })?;
                Ok(PatchOp::Add { fact })
            }
            "replace" => {
                let segments = segments()?;
                let [index, field] = segments.as_slice() else {
                    return Err(invalid_path("replace expects /extracted_facts/{index}/{field}"));
                };
                let index = parse_index(index).ok_or_else(|| invalid_path("bad array index"))?;
                let field: FactField = field
                    .parse()
                    .map_err(|_| invalid_path("unknown fact field"))?;
                let update = FieldUpdate::parse(op, field, raw.value.as_ref())?;
                Ok(PatchOp::Replace { index, update })
            }
            "remove" => {
                let segments = segments()?;
                let [index] = segments.as_slice() else {
                    return Err(invalid_path("remove expects /extracted_facts/{index}"));
                };
                let index = parse_index(index).ok_or_else(|| invalid_path("bad array index"))?;
                Ok(PatchOp::Remove { index })
            }
            other => Err(PatchError::UnknownOp {
                op,
                name: other.to_string(),
            }),
        }
    }
}

/// Split `/extracted_facts/a/b` into `["a", "b"]` (JSON pointer unescaped).
fn split_facts_path(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix(FACTS_POINTER)?.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}

/// RFC 6901 array index: digits only, no leading zeros.
fn parse_index(segment: &str) -> Option<usize> {
    let well_formed = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if well_formed {
        segment.parse().ok()
    } else {
        None
    }
}

/// Per-kind operation counts, for logging and the audit trail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchStats {
    pub added: usize,
    pub replaced: usize,
    pub removed: usize,
}

impl PatchStats {
    pub fn from_ops(ops: &[PatchOp]) -> Self {
        ops.iter().fold(Self::default(), |mut stats, op| {
            match op {
                PatchOp::Add { .. } => stats.added += 1,
                PatchOp::Replace { .. } => stats.replaced += 1,
                PatchOp::Remove { .. } => stats.removed += 1,
            }
            stats
        })
    }

    pub fn total(&self) -> usize {
        self.added + self.replaced + self.removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_index_rules() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("012"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn test_parse_unknown_op() {
        let raw = RawPatchOp {
            op: "move".to_string(),
            path: "/extracted_facts/0".to_string(),
            value: None,
        };
        assert_eq!(
            PatchOp::parse(4, &raw),
            Err(PatchError::UnknownOp {
                op: 4,
                name: "move".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_foreign_root() {
        let raw = RawPatchOp {
            op: "remove".to_string(),
            path: "/extraction_metadata/model_used".to_string(),
            value: None,
        };
        assert!(matches!(
            PatchOp::parse(0, &raw),
            Err(PatchError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_indexed_add() {
        let raw = RawPatchOp {
            op: "add".to_string(),
            path: "/extracted_facts/2".to_string(),
            value: Some(json!({})),
        };
        assert!(matches!(
            PatchOp::parse(0, &raw),
            Err(PatchError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_replace_id_is_immutable() {
        let raw = RawPatchOp::replace(0, "id", json!("fact_999"));
        assert_eq!(
            PatchOp::parse(0, &raw),
            Err(PatchError::ImmutableField {
                op: 0,
                field: "id".to_string()
            })
        );

        // Rejected as immutable even without a value
        let mut raw = RawPatchOp::replace(1, "id", json!(null));
        raw.value = None;
        assert_eq!(
            PatchOp::parse(3, &raw),
            Err(PatchError::ImmutableField {
                op: 3,
                field: "id".to_string()
            })
        );
    }

    #[test]
    fn test_parse_replace_without_value() {
        let mut raw = RawPatchOp::replace(0, "text", json!(null));
        raw.value = None;
        assert_eq!(
            PatchOp::parse(0, &raw),
            Err(PatchError::InvalidFactSchema {
                op: 0,
                source: FactError::MissingField("value")
            })
        );
    }

    #[test]
    fn test_parse_replace_unknown_field() {
        let raw = RawPatchOp::replace(0, "weight", json!(3));
        assert!(matches!(
            PatchOp::parse(0, &raw),
            Err(PatchError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_replace_typed_values() {
        let op = PatchOp::parse(0, &RawPatchOp::replace(2, "category", json!("Location"))).unwrap();
        assert_eq!(
            op,
            PatchOp::Replace {
                index: 2,
                update: FieldUpdate::Category(FactCategory::Location)
            }
        );

        let err = PatchOp::parse(1, &RawPatchOp::replace(0, "confidence", json!(2.0))).unwrap_err();
        assert_eq!(
            err,
            PatchError::InvalidFactSchema {
                op: 1,
                source: FactError::ConfidenceOutOfRange(2.0)
            }
        );
    }

    #[test]
    fn test_patch_document_accepts_envelope_or_array() {
        let envelope = r#"{"patch":[{"op":"remove","path":"/extracted_facts/0"}]}"#;
        let bare = r#"[{"op":"remove","path":"/extracted_facts/0"}]"#;
        assert_eq!(
            PatchDocument::from_json_str(envelope).unwrap(),
            PatchDocument::from_json_str(bare).unwrap()
        );
        assert!(PatchDocument::from_json_str("{\"ops\": []}").is_err());
    }

    #[test]
    fn test_patch_stats() {
        let ops = vec![
            PatchOp::Remove { index: 0 },
            PatchOp::Remove { index: 1 },
            PatchOp::Add {
                fact: RawFact::default(),
            },
        ];
        let stats = PatchStats::from_ops(&ops);
        assert_eq!(stats.removed, 2);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.total(), 3);
    }
}
