//! Scorer: loaded artifacts plus the feature mapper, applied per request

use crate::config::AppConfig;
use crate::error::{Result, ScoringError};
use crate::feature_mapper::{FeatureMapper, FeatureMatrix};
use crate::metrics::ScoringMetrics;
use crate::models::classifier::Classifier;
use crate::models::loader::ModelLoader;
use crate::schema::{FeatureSchema, PreprocessingPolicy};
use crate::types::{DecisionThreshold, OrderRecord, PredictionResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Immutable scoring context, built once at startup.
///
/// Construction runs the schema self-check, so a `Scorer` that exists can
/// only feed its classifier the column layout it was trained on.
pub struct Scorer {
    mapper: FeatureMapper,
    classifier: Box<dyn Classifier>,
    threshold: DecisionThreshold,
    max_batch_size: usize,
    metrics: Arc<ScoringMetrics>,
}

impl Scorer {
    /// Assemble a scorer, verifying the mapper's schema against the
    /// classifier's feature list.
    pub fn new(
        mapper: FeatureMapper,
        classifier: Box<dyn Classifier>,
        threshold: DecisionThreshold,
    ) -> Result<Self> {
        mapper.schema().verify(classifier.feature_names())?;

        Ok(Self {
            mapper,
            classifier,
            threshold,
            max_batch_size: usize::MAX,
            metrics: Arc::new(ScoringMetrics::new()),
        })
    }

    /// Load every artifact the configured policy needs. Any failure here
    /// must stop the process before it serves traffic.
    pub fn load(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.artifacts.onnx_threads);
        let policy = config.detection.policy;

        let mapper = match policy {
            PreprocessingPolicy::OneHot => FeatureMapper::one_hot(),
            PreprocessingPolicy::Scaled => {
                let scaler_path = config.artifacts.scaler_path.as_deref().ok_or_else(|| {
                    ScoringError::artifact("scaler", "", "no scaler_path configured for the scaled policy")
                })?;
                let encoder_path = config.artifacts.encoder_path.as_deref().ok_or_else(|| {
                    ScoringError::artifact("encoder", "", "no encoder_path configured for the scaled policy")
                })?;
                FeatureMapper::scaled(loader.load_scaler(scaler_path)?, loader.load_encoder(encoder_path)?)
            }
        };

        let classifier = loader.load_classifier(&config.artifacts.classifier_path)?;

        let scorer = Self::new(mapper, classifier, config.detection.threshold)?
            .with_max_batch_size(config.detection.max_batch_size);

        info!(
            policy = policy.as_str(),
            model = %scorer.classifier.name(),
            features = scorer.schema().len(),
            threshold = scorer.threshold.value(),
            "Scorer ready, feature schema verified"
        );

        Ok(scorer)
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ScoringMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ScoringMetrics> {
        &self.metrics
    }

    pub fn policy(&self) -> PreprocessingPolicy {
        self.mapper.policy()
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.mapper.schema()
    }

    pub fn threshold(&self) -> DecisionThreshold {
        self.threshold
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Score one order
    pub fn score(&self, order: &OrderRecord) -> Result<PredictionResult> {
        let start_time = Instant::now();
        let outcome = self
            .mapper
            .map(order)
            .and_then(|vector| FeatureMatrix::from_vectors(self.schema(), vec![vector]))
            .and_then(|matrix| self.predict_matrix(&matrix));

        let results = self.finish(start_time, outcome)?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ScoringError::Inference("classifier returned no score".to_string()))
    }

    /// Score a batch; results line up one-to-one with `orders`.
    pub fn score_batch(&self, orders: &[OrderRecord]) -> Result<Vec<PredictionResult>> {
        let start_time = Instant::now();
        let outcome = self
            .check_batch_shape(orders)
            .and_then(|_| self.mapper.map_batch(orders))
            .and_then(|matrix| self.predict_matrix(&matrix));

        self.finish(start_time, outcome)
    }

    /// Fraud probabilities for a batch, without thresholding or metrics.
    pub fn probabilities(&self, orders: &[OrderRecord]) -> Result<Vec<f64>> {
        self.check_batch_shape(orders)?;
        let matrix = self.mapper.map_batch(orders)?;
        self.classify(&matrix)
    }

    fn check_batch_shape(&self, orders: &[OrderRecord]) -> Result<()> {
        if orders.is_empty() {
            return Err(ScoringError::malformed("orders", "batch is empty"));
        }
        if orders.len() > self.max_batch_size {
            return Err(ScoringError::malformed(
                "orders",
                format!(
                    "batch of {} orders exceeds the limit of {}",
                    orders.len(),
                    self.max_batch_size
                ),
            ));
        }
        Ok(())
    }

    fn predict_matrix(&self, matrix: &FeatureMatrix) -> Result<Vec<PredictionResult>> {
        for (row, fallback) in matrix.fallbacks() {
            warn!(
                row = row,
                column = %fallback.column,
                value = %fallback.value,
                bucket = fallback.bucket.as_deref().unwrap_or("none"),
                "Unknown category routed to fallback"
            );
            self.metrics.record_fallback(&fallback.column);
        }

        let probabilities = self.classify(matrix)?;
        Ok(probabilities
            .into_iter()
            .map(|p| PredictionResult::from_probability(p, self.threshold))
            .collect())
    }

    fn classify(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        self.schema().check_width(matrix.columns())?;

        let probabilities = self.classifier.predict_proba(matrix)?;
        if probabilities.len() != matrix.rows() {
            return Err(ScoringError::Inference(format!(
                "classifier returned {} scores for {} orders",
                probabilities.len(),
                matrix.rows()
            )));
        }

        probabilities
            .into_iter()
            .map(|p| {
                if p.is_finite() {
                    Ok(p.clamp(0.0, 1.0))
                } else {
                    Err(ScoringError::Inference(format!("classifier returned {p}")))
                }
            })
            .collect()
    }

    fn finish(
        &self,
        start_time: Instant,
        outcome: Result<Vec<PredictionResult>>,
    ) -> Result<Vec<PredictionResult>> {
        match outcome {
            Ok(results) => {
                let processing_time = start_time.elapsed();
                self.metrics.record_scored(processing_time, &results);
                debug!(
                    orders = results.len(),
                    flagged = results.iter().filter(|r| r.is_fraud).count(),
                    processing_time_us = processing_time.as_micros() as u64,
                    "Orders scored"
                );
                Ok(results)
            }
            Err(e) => {
                self.metrics.record_error(&e);
                Err(e)
            }
        }
    }
}
