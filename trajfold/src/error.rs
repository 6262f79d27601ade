//! Error types for the trajfold engine.
//!
//! All fallible operations return [`TrajResult`]. Argument problems are caught
//! before any block task is dispatched; failures inside a block task are always
//! reported as [`TrajError::AnalysisFailed`] so the caller learns which frames
//! were being processed.

use thiserror::Error;

use crate::analysis::RunPhase;
use crate::partition::BlockSlice;

/// Result type for trajfold operations.
pub type TrajResult<T> = Result<T, TrajError>;

/// Errors that can occur while partitioning, running or reducing an analysis.
#[derive(Error, Debug)]
pub enum TrajError {
    /// Malformed partition or configuration request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A block task failed; the whole run is aborted.
    #[error("Analysis failed in block {block_index} ({block}): {cause}")]
    AnalysisFailed {
        /// Position of the block in the partition plan.
        block_index: usize,
        /// Bounds of the failing block.
        block: BlockSlice,
        /// What went wrong inside the task.
        #[source]
        cause: Box<TrajError>,
    },

    /// A lifecycle operation was called in the wrong phase.
    #[error("Invalid state: cannot {operation} while the run is {phase}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The phase the run was in.
        phase: RunPhase,
    },

    /// Reading a frame from the trajectory failed.
    #[error("Frame error: {0}")]
    Frame(String),

    /// The per-frame step of an analysis failed.
    #[error("Failed to compute frame result: {0}")]
    Computation(String),

    /// A worker task was cancelled, panicked or could not be scheduled.
    #[error("Worker error: {0}")]
    Worker(String),

    /// The folded result holds no observations.
    #[error("No frames available for analysis")]
    NoData,

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrajError {
    /// Creates an invalid argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an invalid state error for `operation` attempted during `phase`.
    pub fn invalid_state(operation: &'static str, phase: RunPhase) -> Self {
        Self::InvalidState { operation, phase }
    }

    /// Wraps `cause` as the failure of block `block_index`.
    pub fn analysis_failed(block_index: usize, block: BlockSlice, cause: TrajError) -> Self {
        Self::AnalysisFailed {
            block_index,
            block,
            cause: Box::new(cause),
        }
    }

    /// Creates a frame read error with the given message.
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::Frame(msg.into())
    }

    /// Creates a per-frame computation error with the given message.
    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    /// Creates a worker error with the given message.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns the bounds of the failing block for [`TrajError::AnalysisFailed`].
    pub fn failed_block(&self) -> Option<(usize, BlockSlice)> {
        match self {
            Self::AnalysisFailed {
                block_index, block, ..
            } => Some((*block_index, *block)),
            _ => None,
        }
    }
}

/// Converts serde_json errors to TrajError.
impl From<serde_json::Error> for TrajError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
