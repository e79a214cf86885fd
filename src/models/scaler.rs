//! Fitted standard scaler for the numeric aggregates

use crate::schema::NUMERIC_COLUMNS;
use serde::{Deserialize, Serialize};

/// Parameters as exported by training
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Standardizes each aggregate to `(x - mean) / scale`.
///
/// Columns must be the numeric aggregates in training order; this is checked
/// when the artifact is deserialized, so a constructed scaler is always
/// consistent with the feature schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ScalerParams", into = "ScalerParams")]
pub struct StandardScaler {
    params: ScalerParams,
}

impl StandardScaler {
    pub fn new(columns: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        Self::try_from(ScalerParams {
            columns,
            mean,
            scale,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.params.columns
    }

    /// Scale values given in `NUMERIC_COLUMNS` order, appending to `out`.
    pub fn transform_into(&self, values: &[f64; NUMERIC_COLUMNS.len()], out: &mut Vec<f64>) {
        out.extend(
            values
                .iter()
                .zip(self.params.mean.iter().zip(&self.params.scale))
                .map(|(x, (mean, scale))| (x - mean) / scale),
        );
    }
}

impl TryFrom<ScalerParams> for StandardScaler {
    type Error = String;

    fn try_from(params: ScalerParams) -> Result<Self, Self::Error> {
        if params.columns.iter().map(String::as_str).ne(NUMERIC_COLUMNS.iter().copied()) {
            return Err(format!(
                "scaler columns {:?} do not match numeric columns {:?}",
                params.columns, NUMERIC_COLUMNS
            ));
        }

        if params.mean.len() != params.columns.len() || params.scale.len() != params.columns.len() {
            return Err(format!(
                "scaler has {} columns but {} means and {} scales",
                params.columns.len(),
                params.mean.len(),
                params.scale.len()
            ));
        }

        if let Some(i) = params.mean.iter().position(|m| !m.is_finite()) {
            return Err(format!("mean of `{}` is not finite", params.columns[i]));
        }

        if let Some(i) = params
            .scale
            .iter()
            .position(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(format!(
                "scale of `{}` must be finite and non-zero",
                params.columns[i]
            ));
        }

        Ok(Self { params })
    }
}

impl From<StandardScaler> for ScalerParams {
    fn from(scaler: StandardScaler) -> Self {
        scaler.params
    }
}
