// Stop-condition evaluation
//
// Convergence is whatever the assessor says it is: no missing facts and no
// incorrect facts. Recommendations alone never block convergence.

use crate::facts::CoverageReport;

/// What the loop does after an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// No gaps reported; stop with `converged = true`
    Stop,
    /// Gaps remain; ask for a patch
    Patch,
}

pub fn check_convergence(report: &CoverageReport) -> bool {
    !report.has_gaps()
}

pub fn next_step(report: &CoverageReport) -> NextStep {
    if check_convergence(report) {
        NextStep::Stop
    } else {
        NextStep::Patch
    }
}

/// Whether another assess/patch cycle fits in the budget.
pub fn within_budget(iteration: usize, max_iterations: usize) -> bool {
    iteration < max_iterations
}
