// Patch applier: all-or-nothing application against a working copy

use std::collections::HashSet;

use crate::errors::PatchError;
use crate::facts::FactSet;

use super::types::{PatchOp, RawPatchOp};

/// Parse and apply a wire-format patch.
///
/// Every operation is validated before anything is applied. The input is never
/// modified; on error no partial result escapes.
pub fn apply(fact_set: &FactSet, ops: &[RawPatchOp]) -> Result<FactSet, PatchError> {
    let parsed = ops
        .iter()
        .enumerate()
        .map(|(i, raw)| PatchOp::parse(i, raw))
        .collect::<Result<Vec<_>, _>>()?;
    apply_ops(fact_set, &parsed)
}

/// Apply already-validated operations in order.
///
/// Indices are resolved against `fact_set` as given (the pre-patch snapshot):
/// each snapshot index maps to the id it named, and that id is looked up in the
/// working copy when the operation runs.
pub fn apply_ops(fact_set: &FactSet, ops: &[PatchOp]) -> Result<FactSet, PatchError> {
    let snapshot_ids: Vec<&str> = fact_set
        .extracted_facts
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    let snapshot_high_water = fact_set
        .extracted_facts
        .iter()
        .filter_map(|f| f.sequence_number())
        .max()
        .unwrap_or(0);

    let mut working = fact_set.clone();
    let mut removed: HashSet<usize> = HashSet::new();

    let resolve = |op: usize,
                   index: usize,
                   working: &FactSet,
                   removed: &HashSet<usize>|
     -> Result<usize, PatchError> {
        let id = snapshot_ids
            .get(index)
            .ok_or(PatchError::IndexOutOfRange {
                op,
                index,
                len: snapshot_ids.len(),
            })?;
        if removed.contains(&index) {
            return Err(PatchError::AmbiguousIndex { op, index });
        }
        working
            .position_of(id)
            .ok_or(PatchError::AmbiguousIndex { op, index })
    };

    for (op, operation) in ops.iter().enumerate() {
        match operation {
            PatchOp::Add { fact } => {
                let explicit_id = fact.has_id();
                let fact = fact
                    .clone()
                    .into_fact(|| working.next_fact_id(snapshot_high_water))
                    .map_err(|source| PatchError::InvalidFactSchema { op, source })?;
                if explicit_id && working.contains_id(&fact.id) {
                    return Err(PatchError::DuplicateFactId { op, id: fact.id });
                }
                working.extracted_facts.push(fact);
            }
            PatchOp::Replace { index, update } => {
                let position = resolve(op, *index, &working, &removed)?;
                let updated = update.applied_to(&working.extracted_facts[position]);
                updated
                    .validate()
                    .map_err(|source| PatchError::InvalidFactSchema { op, source })?;
                working.extracted_facts[position] = updated;
            }
            PatchOp::Remove { index } => {
                let position = resolve(op, *index, &working, &removed)?;
                working.extracted_facts.remove(position);
                removed.insert(*index);
            }
        }
    }

    if let Some(id) = working.first_duplicate_id() {
        return Err(PatchError::DuplicateFactId {
            op: ops.len().saturating_sub(1),
            id: id.to_string(),
        });
    }

    Ok(working)
}
