//! Order Fraud Scoring Library
//!
//! Turns e-commerce order records into the feature layout a pre-trained
//! fraud classifier expects, scores them, and serves the verdicts over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod feature_mapper;
pub mod metrics;
pub mod models;
pub mod schema;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{Result, ScoringError};
pub use feature_mapper::{FeatureMapper, FeatureVector};
pub use models::inference::Scorer;
pub use schema::{FeatureSchema, PreprocessingPolicy};
pub use types::{order::OrderRecord, prediction::PredictionResult};
