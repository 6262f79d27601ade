//! Block-parallel analysis skeleton.
//!
//! An analysis implements [`ParallelAnalysis`]; an [`AnalysisRun`] partitions
//! the selected frames, runs one task per block on a worker pool and folds the
//! block partials in block order before the analysis concludes.

mod context;
mod run;
mod traits;

pub use context::RunContext;
pub use run::{AnalysisRun, BlockOutcome, RunPhase};
pub use traits::{Combine, ParallelAnalysis};
