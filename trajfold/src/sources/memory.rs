//! An in-memory trajectory.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{FrameLike, FrameReader, FrameSource, HasAtoms, Positions};
use crate::error::{TrajError, TrajResult};
use crate::partition::BlockSlice;

/// One coordinate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub time: f64,
    pub positions: Vec<[f64; 3]>,
}

impl FrameLike for Frame {
    fn index(&self) -> usize {
        self.index
    }

    fn time(&self) -> f64 {
        self.time
    }
}

impl Positions for Frame {
    fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }
}

/// Trajectory held entirely in memory.
///
/// Frames are shared behind an [`Arc`]; every reader gets its own handle.
#[derive(Debug, Clone)]
pub struct InMemoryTrajectory {
    frames: Arc<Vec<Frame>>,
    n_atoms: usize,
    dt: f64,
    start_time: f64,
}

impl InMemoryTrajectory {
    /// Builds a trajectory from per-frame coordinates, `dt` apart.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::InvalidArgument`] when `dt` is not a positive finite
    /// number or frames disagree on the number of atoms.
    pub fn new(positions: Vec<Vec<[f64; 3]>>, dt: f64) -> TrajResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TrajError::invalid_argument(format!(
                "dt must be positive and finite, got {dt}"
            )));
        }
        let n_atoms = positions.first().map_or(0, Vec::len);
        if let Some((index, frame)) = positions
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.len() != n_atoms)
        {
            return Err(TrajError::invalid_argument(format!(
                "frame {index} has {} atoms, expected {n_atoms}",
                frame.len()
            )));
        }

        let frames = positions
            .into_iter()
            .enumerate()
            .map(|(index, positions)| Frame {
                index,
                time: index as f64 * dt,
                positions,
            })
            .collect();

        Ok(Self {
            frames: Arc::new(frames),
            n_atoms,
            dt,
            start_time: 0.0,
        })
    }

    /// Shifts every frame time so that frame 0 is at `start_time`.
    pub fn with_start_time(mut self, start_time: f64) -> Self {
        let dt = self.dt;
        let frames = Arc::make_mut(&mut self.frames);
        for frame in frames.iter_mut() {
            frame.time = start_time + frame.index as f64 * dt;
        }
        self.start_time = start_time;
        self
    }

    /// Returns frame `index`, if present.
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// All frames in order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl HasAtoms for InMemoryTrajectory {
    fn n_atoms(&self) -> usize {
        self.n_atoms
    }
}

impl FrameSource for InMemoryTrajectory {
    type Reader = MemoryReader;

    fn n_frames(&self) -> usize {
        self.frames.len()
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn open(&self) -> TrajResult<MemoryReader> {
        Ok(MemoryReader {
            frames: Arc::clone(&self.frames),
        })
    }
}

/// Reader over an [`InMemoryTrajectory`].
#[derive(Debug, Clone)]
pub struct MemoryReader {
    frames: Arc<Vec<Frame>>,
}

impl FrameReader for MemoryReader {
    type Frame = Frame;

    fn read_block<'a>(
        &'a mut self,
        block: &BlockSlice,
    ) -> TrajResult<Box<dyn Iterator<Item = TrajResult<Frame>> + 'a>> {
        let frames = &self.frames;
        Ok(Box::new(
            block
                .indices(frames.len())
                .map(move |i| Ok(frames[i].clone())),
        ))
    }
}
