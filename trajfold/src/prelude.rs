//! Prelude for commonly used types and traits in trajfold.

pub use crate::analyses::{FluctuationResult, PositionFluctuation};
pub use crate::analysis::{AnalysisRun, Combine, ParallelAnalysis, RunContext, RunPhase};
pub use crate::config::{FrameSelection, RunConfig};
pub use crate::error::{TrajError, TrajResult};
pub use crate::logging::LogConfig;
pub use crate::moments::{fold_moments, Moments};
pub use crate::partition::{make_balanced_slices, BlockSlice, PartitionPlan};
pub use crate::pool::{InlinePool, TokioPool, WorkerPool};
pub use crate::sources::{
    Frame, FrameLike, FrameOf, FrameReader, FrameSource, HasAtoms, InMemoryTrajectory, Positions,
};
