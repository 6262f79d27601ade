//! # trajfold - block-parallel trajectory analysis
//!
//! trajfold runs a per-frame analysis of a long, ordered sequence of
//! observations, typically a molecular dynamics trajectory with one coordinate
//! snapshot per time step, on several workers at once. The result is the one a
//! single serial pass over the frames would produce.
//!
//! ## Overview
//!
//! A run has three moving parts:
//!
//! - the [`partition`] module splits the selected `start:stop:step` frame range
//!   into balanced, contiguous blocks that cover every frame exactly once;
//! - an [`analysis::ParallelAnalysis`] turns each frame into a partial result
//!   and knows how to [`combine`](analysis::ParallelAnalysis::combine) two of
//!   them;
//! - an [`analysis::AnalysisRun`] dispatches one task per block to a
//!   [`pool::WorkerPool`], folds the block partials in block order and lets the
//!   analysis conclude.
//!
//! Record analyses use `Vec<T>` partials, which concatenate. Statistics
//! analyses use [`moments::Moments`], which merge count, mean and sum of
//! squared deviations without revisiting the data.
//!
//! ## Quick Start
//!
//! ```rust
//! use trajfold::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> TrajResult<()> {
//! let positions = (0..100)
//!     .map(|i| vec![[(i % 4) as f64, 0.0, 0.0], [1.0, 1.0, 1.0]])
//!     .collect();
//! let trajectory = InMemoryTrajectory::new(positions, 0.002)?;
//!
//! let config = RunConfig::new().with_n_blocks(4).with_step(2);
//! let mut run = AnalysisRun::new(PositionFluctuation::all_atoms(), trajectory, config);
//!
//! let result = run.run_parallel().await?;
//! assert_eq!(result.n_frames, 50);
//! assert_eq!(result.rmsf[1], 0.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Every run phase emits `tracing` events. Install a subscriber with
//! [`logging::setup::init_logging`] or bring your own; per-block and
//! per-frame detail is controlled by [`logging::LogConfig`].

pub mod analyses;
pub mod analysis;
pub mod config;
pub mod error;
pub mod logging;
pub mod moments;
pub mod partition;
pub mod pool;
pub mod prelude;
pub mod sources;
pub mod timing;
