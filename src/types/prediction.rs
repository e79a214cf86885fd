//! Prediction output and decision threshold

use serde::{Deserialize, Serialize};

/// Cut point on the fraud probability.
///
/// Operators move it to trade precision for recall without retraining.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DecisionThreshold(f64);

impl DecisionThreshold {
    pub const DEFAULT: f64 = 0.5;

    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("threshold must be within [0, 1], got {value}"))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Strictly greater than: a score equal to the threshold is not fraud.
    pub fn is_fraud(&self, probability: f64) -> bool {
        probability > self.0
    }
}

impl Default for DecisionThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<f64> for DecisionThreshold {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DecisionThreshold> for f64 {
    fn from(threshold: DecisionThreshold) -> Self {
        threshold.0
    }
}

/// Verdict for one order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 0 = regular order, 1 = fraud
    pub prediction: u8,

    /// Probability of the fraud class (0.0 - 1.0)
    pub confidence: f64,

    /// Same verdict as `prediction`, as a boolean
    pub is_fraud: bool,
}

impl PredictionResult {
    pub fn from_probability(probability: f64, threshold: DecisionThreshold) -> Self {
        let is_fraud = threshold.is_fraud(probability);
        Self {
            prediction: u8::from(is_fraud),
            confidence: probability,
            is_fraud,
        }
    }
}
