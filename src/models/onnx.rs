//! ONNX Runtime backed classifier

use crate::error::{Result, ScoringError};
use crate::feature_mapper::FeatureMatrix;
use crate::models::classifier::Classifier;
use anyhow::Context;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing::{debug, info};

static ORT_INIT: Once = Once::new();

/// Loaded ONNX session with resolved input/output names
struct LoadedModel {
    session: Session,
    input_name: String,
    output_name: String,
}

/// Classifier exported to ONNX (CatBoost, XGBoost, sklearn via skl2onnx).
///
/// ONNX Runtime needs exclusive access to a session per run, so the session
/// sits behind a mutex; everything else is immutable.
pub struct OnnxClassifier {
    name: String,
    feature_names: Vec<String>,
    model: Mutex<LoadedModel>,
}

impl OnnxClassifier {
    /// Load a model from file
    pub fn load(path: &Path, name: &str, feature_names: Vec<String>, threads: usize) -> anyhow::Result<Self> {
        ORT_INIT.call_once(|| {
            if ort::init().commit().is_ok() {
                info!("ONNX Runtime initialized");
            }
        });

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            features = feature_names.len(),
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            feature_names,
            model: Mutex::new(LoadedModel {
                session,
                input_name,
                output_name,
            }),
        })
    }

    fn run(&self, features: &FeatureMatrix) -> anyhow::Result<Vec<f64>> {
        let rows = features.rows();
        let shape = vec![rows as i64, features.columns() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_f32())).context("Failed to create input tensor")?;

        let mut guard = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let model = &mut *guard;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])?;

        extract_probabilities(&outputs, &model.output_name, rows)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.rows() == 0 {
            return Ok(Vec::new());
        }
        self.run(features)
            .map_err(|e| ScoringError::Inference(format!("{}: {e:#}", self.name)))
    }
}

/// Read per-row fraud probabilities from the session outputs.
///
/// Tensor outputs come from XGBoost and sklearn exports, `seq(map)` outputs
/// from CatBoost and LightGBM. The named probability output is tried first,
/// then every non-label output.
fn extract_probabilities(outputs: &SessionOutputs, output_name: &str, rows: usize) -> anyhow::Result<Vec<f64>> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(probabilities) = probabilities_from_value(output, rows)? {
            return Ok(probabilities);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(probabilities) = probabilities_from_value(&output, rows)? {
            debug!(output = %name, "Extracted probabilities from fallback output");
            return Ok(probabilities);
        }
    }

    anyhow::bail!("no probability output found among model outputs")
}

fn probabilities_from_value(output: &DynValue, rows: usize) -> anyhow::Result<Option<Vec<f64>>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probabilities_from_tensor(&dims, data, rows).map(Some);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return probabilities_from_sequence_map(output, rows).map(Some);
    }

    Ok(None)
}

/// `[N, classes]` reads column 1 (or 0 for a single column), `[N]` reads as is.
fn probabilities_from_tensor(dims: &[i64], data: &[f32], rows: usize) -> anyhow::Result<Vec<f64>> {
    let columns = match dims {
        [n, c] if *n as usize == rows && *c >= 1 => *c as usize,
        [n] if *n as usize == rows => 1,
        _ => anyhow::bail!("unexpected probability tensor shape {:?} for {} rows", dims, rows),
    };

    if data.len() < rows * columns {
        anyhow::bail!("probability tensor holds {} values, expected {}", data.len(), rows * columns);
    }

    let class = if columns >= 2 { 1 } else { 0 };
    Ok((0..rows).map(|i| data[i * columns + class] as f64).collect())
}

/// One `map(int64, float)` per row; class 1 is fraud.
fn probabilities_from_sequence_map(output: &DynValue, rows: usize) -> anyhow::Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    if maps.len() != rows {
        anyhow::bail!("probability sequence has {} entries for {} rows", maps.len(), rows);
    }

    maps.iter()
        .map(|map_value| -> anyhow::Result<f64> {
            let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
            if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
                return Ok(*prob as f64);
            }
            if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
                return Ok(1.0 - *prob as f64);
            }
            anyhow::bail!("No probability found in map")
        })
        .collect()
}
