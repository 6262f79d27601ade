//! Trajectory access used by block tasks.
//!
//! The engine never reads files itself. A [`FrameSource`] describes a
//! trajectory and opens independent [`FrameReader`]s, one per block task, so
//! no two tasks share a cursor.

use std::fmt::Debug;

use crate::error::TrajResult;
use crate::partition::BlockSlice;

pub mod memory;

pub use memory::{Frame, InMemoryTrajectory, MemoryReader};

/// A single trajectory frame.
pub trait FrameLike {
    /// Absolute index of the frame in the trajectory.
    fn index(&self) -> usize;

    /// Simulation time of the frame.
    fn time(&self) -> f64;
}

/// Frames that carry Cartesian coordinates, one row per atom.
pub trait Positions {
    fn positions(&self) -> &[[f64; 3]];
}

/// Sources that know the size of the observed system.
pub trait HasAtoms {
    fn n_atoms(&self) -> usize;
}

/// A trajectory that block tasks read from.
///
/// # Example
///
/// ```rust
/// use trajfold::sources::{FrameReader, FrameSource, FrameLike, InMemoryTrajectory};
/// use trajfold::partition::BlockSlice;
///
/// let traj = InMemoryTrajectory::new(vec![vec![[0.0; 3]]; 6], 2.0).unwrap();
/// let mut reader = traj.open().unwrap();
/// let block = BlockSlice::new(1, Some(5), 2).unwrap();
/// let times: Vec<f64> = reader
///     .read_block(&block)
///     .unwrap()
///     .map(|frame| frame.unwrap().time())
///     .collect();
/// assert_eq!(times, vec![2.0, 6.0]);
/// ```
pub trait FrameSource: Debug + Send + Sync + 'static {
    /// Reader handed to a single block task.
    type Reader: FrameReader + Send + 'static;

    /// Total number of frames in the trajectory.
    fn n_frames(&self) -> usize;

    /// Time between consecutive frames.
    fn dt(&self) -> f64 {
        1.0
    }

    /// Time of frame 0.
    fn start_time(&self) -> f64 {
        0.0
    }

    /// Opens an independent reader.
    fn open(&self) -> TrajResult<Self::Reader>;
}

/// Sequential access to the frames of a block.
pub trait FrameReader {
    type Frame: FrameLike + Send + 'static;

    /// Iterates the frames selected by `block`, in increasing index order.
    ///
    /// Indices past the end of the trajectory are not yielded.
    fn read_block<'a>(
        &'a mut self,
        block: &BlockSlice,
    ) -> TrajResult<Box<dyn Iterator<Item = TrajResult<Self::Frame>> + 'a>>;
}

/// Frame type produced by the readers of source `S`.
pub type FrameOf<S> = <<S as FrameSource>::Reader as FrameReader>::Frame;
