//! Per-atom positional fluctuations.

use serde::{Deserialize, Serialize};

use crate::analysis::{ParallelAnalysis, RunContext};
use crate::error::{TrajError, TrajResult};
use crate::moments::Moments;
use crate::sources::{FrameOf, FrameSource, HasAtoms, Positions};

/// Mean position and root-mean-square fluctuation of selected atoms.
///
/// Every frame contributes one observation of `3 * n_selected` coordinates;
/// blocks merge through the moment combiner, so the result matches a serial
/// pass regardless of how the frames were split.
#[derive(Debug, Clone, Default)]
pub struct PositionFluctuation {
    atoms: Option<Vec<usize>>,
}

/// Result of [`PositionFluctuation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluctuationResult {
    /// Number of frames analyzed.
    pub n_frames: usize,
    /// Atom indices, in the order of the per-atom vectors.
    pub atoms: Vec<usize>,
    pub mean_positions: Vec<[f64; 3]>,
    /// `sqrt(<|r - <r>|^2>)` per atom.
    pub rmsf: Vec<f64>,
}

impl PositionFluctuation {
    /// Analyzes every atom of the trajectory.
    pub fn all_atoms() -> Self {
        Self { atoms: None }
    }

    /// Analyzes the given atoms only.
    pub fn for_atoms(atoms: impl Into<Vec<usize>>) -> Self {
        Self {
            atoms: Some(atoms.into()),
        }
    }
}

impl<S> ParallelAnalysis<S> for PositionFluctuation
where
    S: FrameSource + HasAtoms,
    FrameOf<S>: Positions,
{
    type State = Vec<usize>;
    type Partial = Moments;
    type Output = FluctuationResult;

    fn name(&self) -> &str {
        "position_fluctuation"
    }

    fn prepare(&self, source: &S) -> TrajResult<Vec<usize>> {
        let n_atoms = source.n_atoms();
        match &self.atoms {
            None => Ok((0..n_atoms).collect()),
            Some(atoms) if atoms.is_empty() => {
                Err(TrajError::invalid_argument("atom selection is empty"))
            }
            Some(atoms) => {
                if let Some(bad) = atoms.iter().find(|&&atom| atom >= n_atoms) {
                    return Err(TrajError::invalid_argument(format!(
                        "atom {bad} out of range for {n_atoms} atoms"
                    )));
                }
                Ok(atoms.clone())
            }
        }
    }

    fn process_frame(&self, frame: &FrameOf<S>, atoms: &Vec<usize>) -> TrajResult<Moments> {
        let positions = frame.positions();
        let mut values = Vec::with_capacity(atoms.len() * 3);
        for &atom in atoms {
            let position = positions.get(atom).ok_or_else(|| {
                TrajError::computation(format!(
                    "frame has {} atoms, atom {atom} requested",
                    positions.len()
                ))
            })?;
            values.extend_from_slice(position);
        }
        Ok(Moments::from_observation(&values))
    }

    fn conclude(
        &self,
        folded: Moments,
        atoms: &Vec<usize>,
        _context: &RunContext,
    ) -> TrajResult<FluctuationResult> {
        let variance = folded.variance().ok_or(TrajError::NoData)?;

        let mean_positions = folded
            .mean()
            .chunks_exact(3)
            .map(|xyz| [xyz[0], xyz[1], xyz[2]])
            .collect();
        let rmsf = variance
            .chunks_exact(3)
            .map(|var| (var[0] + var[1] + var[2]).sqrt())
            .collect();

        Ok(FluctuationResult {
            n_frames: folded.count() as usize,
            atoms: atoms.clone(),
            mean_positions,
            rmsf,
        })
    }
}
