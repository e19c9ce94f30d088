//! Harvest orchestration: the per-year hierarchy walk and the run that
//! strings years together.

mod coordinator;
mod report;
mod walker;

pub use coordinator::{DEFAULT_OUTPUT_DIR, HarvestError, HarvestOptions, RunCoordinator};
pub use report::{FailureLevel, FailureRecord, RunResult, RunTotals, YearReport, YearStatus};
pub use walker::HierarchyWalker;
