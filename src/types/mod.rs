//! Type definitions for the scoring service

pub mod order;
pub mod prediction;

pub use order::OrderRecord;
pub use prediction::{DecisionThreshold, PredictionResult};
