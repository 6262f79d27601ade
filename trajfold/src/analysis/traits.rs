//! Core analysis traits.

use std::fmt::Debug;

use crate::error::TrajResult;
use crate::moments::Moments;
use crate::sources::{FrameOf, FrameSource};

use super::context::RunContext;

/// Partial results that merge across blocks.
///
/// `combine` must be associative and [`Combine::empty`] must be its neutral
/// element; the run folds partials in ascending block order starting from
/// `empty()`.
pub trait Combine: Sized + Send + 'static {
    /// The neutral element.
    fn empty() -> Self;

    /// Merges `other`, which covers later frames, into `self`.
    fn combine(self, other: Self) -> TrajResult<Self>;
}

/// Record partials concatenate.
impl<T: Send + 'static> Combine for Vec<T> {
    fn empty() -> Self {
        Vec::new()
    }

    fn combine(mut self, mut other: Self) -> TrajResult<Self> {
        self.append(&mut other);
        Ok(self)
    }
}

/// Statistics partials merge through the moment combiner.
impl Combine for Moments {
    fn empty() -> Self {
        Moments::empty()
    }

    fn combine(self, other: Self) -> TrajResult<Self> {
        Moments::combine(&self, &other)
    }
}

/// A per-frame analysis that can run block-parallel.
///
/// The run calls [`prepare`](Self::prepare) once, then
/// [`process_frame`](Self::process_frame) for every selected frame from
/// several worker threads at once, folds the per-frame partials with
/// [`combine`](Self::combine) and hands the result to
/// [`conclude`](Self::conclude). Only `prepare` and `conclude` see the whole
/// trajectory; everything in between must depend on nothing but the frame and
/// the prepared state.
///
/// # Example
///
/// ```rust
/// use trajfold::prelude::*;
///
/// /// Collects `(frame, time)` pairs.
/// #[derive(Debug)]
/// struct FrameTimes;
///
/// impl<S: FrameSource> ParallelAnalysis<S> for FrameTimes {
///     type State = ();
///     type Partial = Vec<(usize, f64)>;
///     type Output = Vec<(usize, f64)>;
///
///     fn name(&self) -> &str {
///         "frame_times"
///     }
///
///     fn prepare(&self, _source: &S) -> TrajResult<()> {
///         Ok(())
///     }
///
///     fn process_frame(&self, frame: &FrameOf<S>, _state: &()) -> TrajResult<Self::Partial> {
///         Ok(vec![(frame.index(), frame.time())])
///     }
///
///     fn conclude(
///         &self,
///         folded: Self::Partial,
///         _state: &(),
///         _context: &RunContext,
///     ) -> TrajResult<Self::Output> {
///         Ok(folded)
///     }
/// }
/// ```
pub trait ParallelAnalysis<S: FrameSource>: Debug + Send + Sync + 'static {
    /// Sequence-dependent configuration resolved by `prepare`, shared
    /// read-only with every block task.
    type State: Send + Sync + 'static;

    /// What one frame, one block and the whole run produce before concluding.
    type Partial: Combine;

    /// Public result shape.
    type Output;

    /// Returns the name of this analysis.
    fn name(&self) -> &str;

    /// Resolves everything that depends on the trajectory as a whole.
    fn prepare(&self, source: &S) -> TrajResult<Self::State>;

    /// Computes the partial result of a single frame.
    fn process_frame(&self, frame: &FrameOf<S>, state: &Self::State)
        -> TrajResult<Self::Partial>;

    /// Merges two partials. `acc` covers earlier frames than `next`.
    ///
    /// Defaults to the partial type's own [`Combine`] implementation.
    fn combine(&self, acc: Self::Partial, next: Self::Partial) -> TrajResult<Self::Partial> {
        acc.combine(next)
    }

    /// Turns the folded partial of all blocks into the public result.
    fn conclude(
        &self,
        folded: Self::Partial,
        state: &Self::State,
        context: &RunContext,
    ) -> TrajResult<Self::Output>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_combine_keeps_order() {
        let merged = vec![1, 2].combine(vec![3]).unwrap();
        assert_eq!(merged, vec![1, 2, 3]);
        assert!(<Vec<u8> as Combine>::empty().is_empty());
    }

    #[test]
    fn test_moments_combine_through_trait() {
        let a = Moments::from_observation(&[1.0]);
        let b = Moments::from_observation(&[3.0]);
        let merged = Combine::combine(a, b).unwrap();
        assert_eq!(merged.count(), 2);
        assert_eq!(merged.mean(), &[2.0]);
        assert_eq!(merged.sum_sq_dev(), &[2.0]);
        assert!(<Moments as Combine>::empty().is_empty());
    }
}
