//! Balanced partitioning of a frame range into contiguous blocks.
//!
//! A [`BlockSlice`] selects frames by absolute index from the *full*
//! trajectory, exactly like a `start:stop:step` slice. The partitioner
//! guarantees that concatenating the frames selected by every block, in block
//! order, reproduces the single direct slice: no frame is read twice and none
//! is skipped.
//!
//! Block sizes differ by at most one frame and the larger blocks come first.
//! That ordering is part of the contract, callers validate exact boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TrajError, TrajResult};

/// A contiguous block of frames, expressed in absolute frame indices.
///
/// `stop` is `None` only for the last block of a plan built without an
/// explicit stop; it then runs through the end of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBlockSlice")]
pub struct BlockSlice {
    start: usize,
    stop: Option<usize>,
    step: usize,
}

#[derive(Deserialize)]
struct RawBlockSlice {
    start: usize,
    stop: Option<usize>,
    step: usize,
}

impl TryFrom<RawBlockSlice> for BlockSlice {
    type Error = TrajError;

    fn try_from(raw: RawBlockSlice) -> TrajResult<Self> {
        BlockSlice::new(raw.start, raw.stop, raw.step)
    }
}

impl BlockSlice {
    /// Creates a block slice, rejecting a zero step and `start > stop`.
    pub fn new(start: usize, stop: Option<usize>, step: usize) -> TrajResult<Self> {
        if step == 0 {
            return Err(TrajError::invalid_argument("step must be > 0"));
        }
        if let Some(stop) = stop {
            if start > stop {
                return Err(TrajError::invalid_argument(format!(
                    "start ({start}) must not exceed stop ({stop})"
                )));
            }
        }
        Ok(Self { start, stop, step })
    }

    /// First absolute frame index of the block.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Exclusive absolute end, or `None` for "through the end".
    pub fn stop(&self) -> Option<usize> {
        self.stop
    }

    /// Stride between selected frames.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Exclusive end of the block within a trajectory of `len` frames.
    pub fn bounded_stop(&self, len: usize) -> usize {
        self.stop.map_or(len, |stop| stop.min(len))
    }

    /// Frame indices this block selects from a trajectory of `len` frames.
    pub fn indices(&self, len: usize) -> impl Iterator<Item = usize> {
        let stop = self.bounded_stop(len);
        (self.start.min(stop)..stop).step_by(self.step)
    }

    /// Number of frames this block selects from a trajectory of `len` frames.
    pub fn len_within(&self, len: usize) -> usize {
        let stop = self.bounded_stop(len);
        if stop <= self.start {
            0
        } else {
            (stop - self.start - 1) / self.step + 1
        }
    }

    /// Whether `frame` is one of the indices selected by this block.
    pub fn contains(&self, frame: usize) -> bool {
        frame >= self.start
            && self.stop.map_or(true, |stop| frame < stop)
            && (frame - self.start) % self.step == 0
    }
}

impl fmt::Display for BlockSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop {
            Some(stop) => write!(f, "{}:{}:{}", self.start, stop, self.step),
            None => write!(f, "{}::{}", self.start, self.step),
        }
    }
}

/// Splits `n_frames` frames into `n_blocks` balanced, contiguous blocks.
///
/// `start`, `stop` and `step` describe the slice of the full trajectory
/// that the `n_frames` frames were taken from; they default to `0`, open and
/// `1`. The returned blocks carry absolute indices into that trajectory.
///
/// # Errors
///
/// Returns [`TrajError::InvalidArgument`] when `n_blocks` is zero, `step` is
/// zero, `start > stop`, or `n_blocks > n_frames` for a non-empty range.
/// An empty range (`n_frames == 0`) yields an empty plan.
///
/// # Example
///
/// ```rust
/// use trajfold::partition::make_balanced_slices;
///
/// let blocks = make_balanced_slices(5, 3, None, None, None).unwrap();
/// let bounds: Vec<_> = blocks.iter().map(|b| (b.start(), b.stop())).collect();
/// assert_eq!(bounds, vec![(0, Some(2)), (2, Some(4)), (4, None)]);
/// ```
pub fn make_balanced_slices(
    n_frames: usize,
    n_blocks: usize,
    start: Option<usize>,
    stop: Option<usize>,
    step: Option<usize>,
) -> TrajResult<Vec<BlockSlice>> {
    if n_blocks == 0 {
        return Err(TrajError::invalid_argument("n_blocks must be > 0"));
    }
    let start = start.unwrap_or(0);
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(TrajError::invalid_argument("step must be > 0"));
    }
    if let Some(stop) = stop {
        if start > stop {
            return Err(TrajError::invalid_argument(format!(
                "start ({start}) must not exceed stop ({stop})"
            )));
        }
    }

    if n_frames == 0 {
        return Ok(Vec::new());
    }
    if n_blocks > n_frames {
        return Err(TrajError::invalid_argument(format!(
            "n_blocks must be smaller than n_frames: {n_blocks} blocks requested for {n_frames} frames"
        )));
    }

    let absolute = |local: usize| -> TrajResult<usize> {
        local
            .checked_mul(step)
            .and_then(|offset| offset.checked_add(start))
            .ok_or_else(|| TrajError::invalid_argument("frame index overflows usize"))
    };

    let base = n_frames / n_blocks;
    let remainder = n_frames % n_blocks;

    let mut blocks = Vec::with_capacity(n_blocks);
    let mut lo = 0;
    for i in 0..n_blocks {
        let hi = lo + if i < remainder { base + 1 } else { base };
        let real_stop = if i + 1 == n_blocks {
            stop
        } else {
            Some(absolute(hi)?)
        };
        blocks.push(BlockSlice {
            start: absolute(lo)?,
            stop: real_stop,
            step,
        });
        lo = hi;
    }

    Ok(blocks)
}

/// The ordered, immutable set of blocks for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    blocks: Vec<BlockSlice>,
}

impl PartitionPlan {
    /// Builds a balanced plan; see [`make_balanced_slices`].
    pub fn balanced(
        n_frames: usize,
        n_blocks: usize,
        start: Option<usize>,
        stop: Option<usize>,
        step: Option<usize>,
    ) -> TrajResult<Self> {
        let blocks = make_balanced_slices(n_frames, n_blocks, start, stop, step)?;
        Ok(Self { blocks })
    }

    /// The blocks, in block-index order.
    pub fn blocks(&self) -> &[BlockSlice] {
        &self.blocks
    }

    /// Returns the block at `index`.
    pub fn get(&self, index: usize) -> Option<&BlockSlice> {
        self.blocks.get(index)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the plan has no blocks (empty frame range).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates `(block_index, block)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BlockSlice)> {
        self.blocks.iter().enumerate()
    }

    /// All frame indices covered by the plan, in order, for a trajectory of `len` frames.
    pub fn frames(&self, len: usize) -> Vec<usize> {
        self.blocks.iter().flat_map(|b| b.indices(len)).collect()
    }

    /// Number of frames per block, for a trajectory of `len` frames.
    pub fn block_sizes(&self, len: usize) -> Vec<usize> {
        self.blocks.iter().map(|b| b.len_within(len)).collect()
    }
}
