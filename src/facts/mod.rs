// Fact data model
//
// Facts are immutable records extracted from a corpus. A FactSet is the
// versioned collection the refinement loop passes between iterations; every
// correction arrives as a JSON patch and produces a new FactSet.

pub mod types;

pub use types::{
    CoverageReport, ExtractionMetadata, Fact, FactCategory, FactError, FactSet, RawFact,
    FACT_ID_PREFIX,
};
