//! Ready-made analyses.

mod fluctuation;

pub use fluctuation::{FluctuationResult, PositionFluctuation};
