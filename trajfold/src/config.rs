//! Run configuration.
//!
//! [`RunConfig`] is plain data: it can be built in code with the `with_*`
//! setters or loaded from JSON.
//!
//! ```rust
//! use trajfold::config::RunConfig;
//!
//! let config = RunConfig::from_json(r#"{"n_blocks": 4, "frames": {"step": 2}}"#).unwrap();
//! assert_eq!(config.n_blocks, Some(4));
//! assert_eq!(config.frames.step, Some(2));
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TrajError, TrajResult};

/// Which frames of the trajectory to analyze, as a `start:stop:step` slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSelection {
    /// First frame. Defaults to 0.
    pub start: Option<usize>,
    /// Exclusive end. Defaults to the end of the trajectory.
    pub stop: Option<usize>,
    /// Stride. Defaults to 1.
    pub step: Option<usize>,
}

/// A [`FrameSelection`] resolved against a trajectory length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
    /// Number of frames selected.
    pub n_frames: usize,
}

impl FrameSelection {
    /// Selects every frame.
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects `start:stop:step`.
    pub fn new(start: Option<usize>, stop: Option<usize>, step: Option<usize>) -> Self {
        Self { start, stop, step }
    }

    fn check(&self) -> TrajResult<()> {
        if self.step == Some(0) {
            return Err(TrajError::invalid_argument("step must be > 0"));
        }
        if let (Some(start), Some(stop)) = (self.start, self.stop) {
            if start > stop {
                return Err(TrajError::invalid_argument(format!(
                    "start ({start}) must not exceed stop ({stop})"
                )));
            }
        }
        Ok(())
    }

    /// Clamps the selection to a trajectory of `total` frames.
    ///
    /// Out-of-range bounds are clamped the way slice bounds are, so a
    /// selection past the end resolves to zero frames.
    pub fn resolve(&self, total: usize) -> TrajResult<ResolvedRange> {
        self.check()?;
        let step = self.step.unwrap_or(1);
        let start = self.start.unwrap_or(0).min(total);
        let stop = self.stop.unwrap_or(total).min(total);
        let n_frames = if stop > start {
            (stop - start - 1) / step + 1
        } else {
            0
        };
        Ok(ResolvedRange {
            start,
            stop,
            step,
            n_frames,
        })
    }
}

/// Configuration of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of blocks. Defaults to the number of logical CPUs, clamped to
    /// the number of selected frames.
    pub n_blocks: Option<usize>,
    /// Frames to analyze.
    pub frames: FrameSelection,
    /// Concurrency cap for the tokio pool. Defaults to the number of logical CPUs.
    pub max_workers: Option<usize>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit block count.
    pub fn with_n_blocks(mut self, n_blocks: usize) -> Self {
        self.n_blocks = Some(n_blocks);
        self
    }

    /// Sets the frame selection.
    pub fn with_frames(mut self, frames: FrameSelection) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.frames.start = Some(start);
        self
    }

    pub fn with_stop(mut self, stop: usize) -> Self {
        self.frames.stop = Some(stop);
        self
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.frames.step = Some(step);
        self
    }

    /// Caps the number of concurrently running block tasks.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Checks the configuration without looking at a trajectory.
    pub fn validate(&self) -> TrajResult<()> {
        if self.n_blocks == Some(0) {
            return Err(TrajError::invalid_argument("n_blocks must be > 0"));
        }
        if self.max_workers == Some(0) {
            return Err(TrajError::invalid_argument("max_workers must be > 0"));
        }
        self.frames.check()
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> TrajResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> TrajResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents).map_err(|e| match e {
            TrajError::Configuration(msg) => {
                TrajError::configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> TrajResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
