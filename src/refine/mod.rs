// Iterative refinement
//
// The only control logic in the crate: drive collaborators until the
// FactSet converges or the iteration budget runs out.

pub mod batch;
pub mod convergence;
pub mod loop_runner;
pub mod types;

pub use batch::{run_batch, worst_status, BatchJob, BatchResult};
pub use loop_runner::RefinementLoop;
pub use types::{
    IterationState, LoopConfig, RefinementOutcome, RunStatus, StopReason,
};
