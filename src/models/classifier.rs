//! Classifier abstraction and the artifact manifest describing one

use crate::error::{Result, ScoringError};
use crate::feature_mapper::FeatureMatrix;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A trained binary classifier, opaque apart from its feature list.
pub trait Classifier: Send + Sync {
    /// Name used in logs and the health endpoint
    fn name(&self) -> &str;

    /// Columns the model was trained on, in order
    fn feature_names(&self) -> &[String];

    /// Fraud-class probability per matrix row, in row order.
    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Classifier manifest written by training, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierManifest {
    /// Coefficients inline
    Logistic(LogisticClassifier),
    /// ONNX graph next to the manifest
    Onnx(OnnxManifest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxManifest {
    #[serde(default = "default_onnx_name")]
    pub name: String,
    pub feature_names: Vec<String>,
    /// Relative paths resolve against the manifest's directory
    pub model_path: PathBuf,
}

fn default_onnx_name() -> String {
    "onnx".to_string()
}

fn default_logistic_name() -> String {
    "logistic".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogisticParams {
    #[serde(default = "default_logistic_name")]
    name: String,
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

/// Logistic regression: `sigmoid(intercept + w · x)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LogisticParams", into = "LogisticParams")]
pub struct LogisticClassifier {
    params: LogisticParams,
}

impl LogisticClassifier {
    pub fn new(feature_names: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> std::result::Result<Self, String> {
        Self::try_from(LogisticParams {
            name: default_logistic_name(),
            feature_names,
            coefficients,
            intercept,
        })
    }

    fn probability(&self, row: &[f64]) -> f64 {
        let z = self.params.intercept
            + row
                .iter()
                .zip(&self.params.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl TryFrom<LogisticParams> for LogisticClassifier {
    type Error = String;

    fn try_from(params: LogisticParams) -> std::result::Result<Self, Self::Error> {
        if params.feature_names.is_empty() {
            return Err("logistic model lists no features".to_string());
        }
        if params.coefficients.len() != params.feature_names.len() {
            return Err(format!(
                "logistic model has {} features but {} coefficients",
                params.feature_names.len(),
                params.coefficients.len()
            ));
        }
        if !params.intercept.is_finite() || params.coefficients.iter().any(|w| !w.is_finite()) {
            return Err("logistic model has non-finite parameters".to_string());
        }
        Ok(Self { params })
    }
}

impl From<LogisticClassifier> for LogisticParams {
    fn from(model: LogisticClassifier) -> Self {
        model.params
    }
}

impl Classifier for LogisticClassifier {
    fn name(&self) -> &str {
        &self.params.name
    }

    fn feature_names(&self) -> &[String] {
        &self.params.feature_names
    }

    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.columns() != self.params.coefficients.len() {
            return Err(ScoringError::SchemaMismatch(format!(
                "matrix has {} columns, model has {} coefficients",
                features.columns(),
                self.params.coefficients.len()
            )));
        }
        if features.rows() == 0 {
            return Ok(Vec::new());
        }

        Ok(features.iter_rows().map(|row| self.probability(row)).collect())
    }
}
