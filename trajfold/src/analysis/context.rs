//! What a run knows about its frame selection.

use serde::{Deserialize, Serialize};

use crate::config::ResolvedRange;

/// Frame bookkeeping handed to [`ParallelAnalysis::conclude`].
///
/// [`ParallelAnalysis::conclude`]: super::ParallelAnalysis::conclude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// The resolved `start:stop:step` selection.
    pub range: ResolvedRange,
    /// Number of blocks in the partition plan.
    pub n_blocks: usize,
    /// Selected absolute frame indices, ascending.
    pub frames: Vec<usize>,
    /// Time of every selected frame.
    pub times: Vec<f64>,
}

impl RunContext {
    /// Builds the context, deriving times as `start_time + frame * dt`.
    pub fn new(
        range: ResolvedRange,
        n_blocks: usize,
        frames: Vec<usize>,
        start_time: f64,
        dt: f64,
    ) -> Self {
        let times = frames
            .iter()
            .map(|&frame| start_time + frame as f64 * dt)
            .collect();
        Self {
            range,
            n_blocks,
            frames,
            times,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Position of absolute frame `frame` within the selection.
    ///
    /// Lets record analyses regroup a flat record list per frame.
    pub fn frame_position(&self, frame: usize) -> Option<usize> {
        self.frames.binary_search(&frame).ok()
    }
}
