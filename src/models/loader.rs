//! Artifact loader for the fitted scaler, encoder and classifier

use crate::error::{Result, ScoringError};
use crate::models::classifier::{Classifier, ClassifierManifest};
use crate::models::encoder::OneHotEncoder;
use crate::models::scaler::StandardScaler;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

/// Loads training artifacts from disk.
///
/// Every failure is an `ArtifactLoad` error naming the artifact and path;
/// callers treat it as fatal at startup.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    pub fn load_scaler(&self, path: &Path) -> Result<StandardScaler> {
        let scaler: StandardScaler = read_json("scaler", path)?;
        info!(path = %path.display(), columns = scaler.columns().len(), "Scaler loaded");
        Ok(scaler)
    }

    pub fn load_encoder(&self, path: &Path) -> Result<OneHotEncoder> {
        let encoder: OneHotEncoder = read_json("encoder", path)?;
        info!(
            path = %path.display(),
            output_columns = encoder.output_columns().len(),
            "Encoder loaded"
        );
        Ok(encoder)
    }

    /// Load the classifier described by a manifest file.
    pub fn load_classifier(&self, path: &Path) -> Result<Box<dyn Classifier>> {
        let manifest: ClassifierManifest = read_json("classifier", path)?;

        let classifier: Box<dyn Classifier> = match manifest {
            ClassifierManifest::Logistic(model) => Box::new(model),
            ClassifierManifest::Onnx(onnx) => self.load_onnx(path, onnx)?,
        };

        info!(
            path = %path.display(),
            model = %classifier.name(),
            features = classifier.feature_names().len(),
            "Classifier loaded"
        );
        Ok(classifier)
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(
        &self,
        manifest_path: &Path,
        manifest: crate::models::classifier::OnnxManifest,
    ) -> Result<Box<dyn Classifier>> {
        let model_path = manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&manifest.model_path);

        if !model_path.exists() {
            return Err(ScoringError::artifact("classifier", model_path, "model file not found"));
        }

        let model = crate::models::onnx::OnnxClassifier::load(
            &model_path,
            &manifest.name,
            manifest.feature_names,
            self.onnx_threads,
        )
        .map_err(|e| ScoringError::artifact("classifier", &model_path, format!("{e:#}")))?;

        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(
        &self,
        manifest_path: &Path,
        _manifest: crate::models::classifier::OnnxManifest,
    ) -> Result<Box<dyn Classifier>> {
        let _ = self.onnx_threads;
        Err(ScoringError::artifact(
            "classifier",
            manifest_path,
            "ONNX classifier requested but this build lacks the `onnx` feature",
        ))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_json<T: DeserializeOwned>(artifact: &'static str, path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| ScoringError::artifact(artifact, path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ScoringError::artifact(artifact, path, e))
}
