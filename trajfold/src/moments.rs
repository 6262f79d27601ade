//! First and second order moments that merge across blocks.
//!
//! [`Moments`] summarizes a set of vector-valued observations as
//! `(count, mean, sum of squared deviations)`. Two summaries of disjoint
//! observation sets combine into the summary of their union without touching
//! the raw observations:
//!
//! ```text
//! n          = a.count + b.count
//! delta      = b.mean - a.mean
//! mean       = a.mean + delta * b.count / n
//! sum_sq_dev = a.sum_sq_dev + b.sum_sq_dev + delta^2 * a.count * b.count / n
//! ```
//!
//! Each partial `sum_sq_dev` is accumulated around its own local mean, so the
//! merge stays accurate where subtracting squared global means would cancel.
//! The empty summary is the neutral element. Balanced block sizes keep the
//! rounding error smallest.

use serde::{Deserialize, Serialize};

use crate::error::{TrajError, TrajResult};

/// Count, elementwise mean and elementwise sum of squared deviations.
///
/// Deserialization goes through [`Moments::new`], so a decoded summary holds
/// the same invariants as a computed one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawMoments")]
pub struct Moments {
    count: u64,
    mean: Vec<f64>,
    sum_sq_dev: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMoments {
    count: u64,
    mean: Vec<f64>,
    sum_sq_dev: Vec<f64>,
}

impl TryFrom<RawMoments> for Moments {
    type Error = TrajError;

    fn try_from(raw: RawMoments) -> TrajResult<Self> {
        Moments::new(raw.count, raw.mean, raw.sum_sq_dev)
    }
}

impl Moments {
    /// The empty summary, neutral element of [`Moments::combine`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a summary from precomputed parts.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::InvalidArgument`] if `mean` and `sum_sq_dev`
    /// differ in width, or any squared deviation is negative or NaN.
    pub fn new(count: u64, mean: Vec<f64>, sum_sq_dev: Vec<f64>) -> TrajResult<Self> {
        if count == 0 {
            return Ok(Self::empty());
        }
        if mean.len() != sum_sq_dev.len() {
            return Err(TrajError::invalid_argument(format!(
                "mean has width {} but sum_sq_dev has width {}",
                mean.len(),
                sum_sq_dev.len()
            )));
        }
        if let Some(bad) = sum_sq_dev.iter().find(|v| v.is_nan() || **v < 0.0) {
            return Err(TrajError::invalid_argument(format!(
                "sum_sq_dev must be non-negative, found {bad}"
            )));
        }
        Ok(Self {
            count,
            mean,
            sum_sq_dev,
        })
    }

    /// Summary of a single observation.
    pub fn from_observation(values: &[f64]) -> Self {
        Self {
            count: 1,
            mean: values.to_vec(),
            sum_sq_dev: vec![0.0; values.len()],
        }
    }

    /// Two-pass summary computed directly from raw observations.
    ///
    /// Every row must have the same width.
    pub fn from_observations<R>(rows: &[R]) -> TrajResult<Self>
    where
        R: AsRef<[f64]>,
    {
        let Some(first) = rows.first() else {
            return Ok(Self::empty());
        };
        let width = first.as_ref().len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            let row = check_width(row.as_ref(), width)?;
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut sum_sq_dev = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in sum_sq_dev.iter_mut().zip(row.as_ref()).zip(&mean) {
                let dev = v - m;
                *s += dev * dev;
            }
        }

        Ok(Self {
            count: rows.len() as u64,
            mean,
            sum_sq_dev,
        })
    }

    /// Adds one observation in place (Welford update).
    pub fn push(&mut self, values: &[f64]) -> TrajResult<()> {
        if self.is_empty() {
            *self = Self::from_observation(values);
            return Ok(());
        }
        let values = check_width(values, self.width())?;

        self.count += 1;
        let n = self.count as f64;
        for ((m, s), v) in self.mean.iter_mut().zip(&mut self.sum_sq_dev).zip(values) {
            let delta = v - *m;
            *m += delta / n;
            *s += delta * (v - *m);
        }
        Ok(())
    }

    /// Merges two summaries of disjoint observation sets.
    ///
    /// Associative and commutative up to floating-point rounding.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::InvalidArgument`] when both summaries are
    /// non-empty and their widths differ.
    pub fn combine(&self, other: &Moments) -> TrajResult<Moments> {
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(other.clone());
        }
        check_width(&other.mean, self.width())?;
        check_width(&other.sum_sq_dev, self.sum_sq_dev.len())?;

        let count = self.count.checked_add(other.count).ok_or_else(|| {
            TrajError::invalid_argument("combined observation count overflows u64")
        })?;
        let n = count as f64;
        let (na, nb) = (self.count as f64, other.count as f64);
        let weight = nb / n;
        let cross = na * nb / n;

        let (mean, sum_sq_dev) = self
            .mean
            .iter()
            .zip(&self.sum_sq_dev)
            .zip(other.mean.iter().zip(&other.sum_sq_dev))
            .map(|((ma, sa), (mb, sb))| {
                let delta = mb - ma;
                (ma + delta * weight, sa + sb + delta * delta * cross)
            })
            .unzip();

        Ok(Moments {
            count,
            mean,
            sum_sq_dev,
        })
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Elementwise mean. Empty for the empty summary.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Elementwise sum of squared deviations from the mean.
    pub fn sum_sq_dev(&self) -> &[f64] {
        &self.sum_sq_dev
    }

    /// Number of components per observation.
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Whether no observations have been summarized.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Population variance (`sum_sq_dev / count`).
    pub fn variance(&self) -> Option<Vec<f64>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(self.sum_sq_dev.iter().map(|s| s / n).collect())
    }

    /// Sample variance with Bessel's correction (`sum_sq_dev / (count - 1)`).
    pub fn sample_variance(&self) -> Option<Vec<f64>> {
        if self.count <= 1 {
            return None;
        }
        let n = (self.count - 1) as f64;
        Some(self.sum_sq_dev.iter().map(|s| s / n).collect())
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<Vec<f64>> {
        self.variance()
            .map(|var| var.into_iter().map(f64::sqrt).collect())
    }
}

/// Folds any number of summaries into one, left to right.
///
/// The result does not depend on the order of `parts` beyond rounding.
pub fn fold_moments<I>(parts: I) -> TrajResult<Moments>
where
    I: IntoIterator<Item = Moments>,
{
    parts
        .into_iter()
        .try_fold(Moments::empty(), |acc, part| acc.combine(&part))
}

fn check_width(values: &[f64], width: usize) -> TrajResult<&[f64]> {
    if values.len() != width {
        return Err(TrajError::invalid_argument(format!(
            "observation width {} does not match expected width {width}",
            values.len()
        )));
    }
    Ok(values)
}
