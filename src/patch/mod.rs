// JSON patch support for fact sets
//
// A subset of RFC 6902 (add / replace / remove) restricted to the
// `/extracted_facts` array. Patches are parsed into typed operations and
// applied all-or-nothing against a copy of the input FactSet.
//
// Index semantics: every numeric index names a position in the FactSet as it
// was *before* the patch. The applier remembers which fact each snapshot index
// pointed at and re-locates it after every operation, so a removal earlier in
// the patch never shifts what a later index means. Targeting a snapshot index
// whose fact was already removed by the same patch is rejected.

pub mod applier;
pub mod types;

pub use applier::{apply, apply_ops};
pub use types::{FactField, FieldUpdate, PatchDocument, PatchOp, PatchStats, RawPatchOp};
