//! Fitted one-hot encoder for the categorical columns

use crate::feature_mapper::CategoryFallback;
use crate::schema::{indicator_name, CATEGORICAL_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One categorical column as exported by training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub column: String,
    pub categories: Vec<String>,
    /// Category that absorbs values unseen during training. Without one,
    /// unseen values encode as all zeros.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncoderParams {
    features: Vec<EncodedColumn>,
}

/// Expands each categorical column into `<column>_<category>` indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EncoderParams", into = "EncoderParams")]
pub struct OneHotEncoder {
    features: Vec<EncodedColumn>,
    fallback_index: Vec<Option<usize>>,
    output_columns: Vec<String>,
}

impl OneHotEncoder {
    pub fn new(features: Vec<EncodedColumn>) -> Result<Self, String> {
        Self::try_from(EncoderParams { features })
    }

    /// Output column names, in the order `encode_into` writes them
    pub fn output_columns(&self) -> &[String] {
        &self.output_columns
    }

    /// Encode values given in `CATEGORICAL_COLUMNS` order, appending the
    /// indicators to `out`. Unseen values never fail; each one is reported
    /// in `fallbacks`.
    pub fn encode_into(
        &self,
        values: [&str; CATEGORICAL_COLUMNS.len()],
        out: &mut Vec<f64>,
        fallbacks: &mut Vec<CategoryFallback>,
    ) {
        for ((feature, fallback), value) in self.features.iter().zip(&self.fallback_index).zip(values) {
            let hit = feature.categories.iter().position(|c| c == value);

            let index = match hit {
                Some(i) => Some(i),
                None => {
                    fallbacks.push(CategoryFallback {
                        column: feature.column.clone(),
                        value: value.to_string(),
                        bucket: feature.fallback.clone(),
                    });
                    *fallback
                }
            };

            out.extend((0..feature.categories.len()).map(|i| if Some(i) == index { 1.0 } else { 0.0 }));
        }
    }
}

impl TryFrom<EncoderParams> for OneHotEncoder {
    type Error = String;

    fn try_from(params: EncoderParams) -> Result<Self, Self::Error> {
        let columns: Vec<&str> = params.features.iter().map(|f| f.column.as_str()).collect();
        if columns != CATEGORICAL_COLUMNS {
            return Err(format!(
                "encoder columns {:?} do not match categorical columns {:?}",
                columns, CATEGORICAL_COLUMNS
            ));
        }

        let mut fallback_index = Vec::with_capacity(params.features.len());
        let mut output_columns = Vec::new();

        for feature in &params.features {
            if feature.categories.is_empty() {
                return Err(format!("encoder column `{}` has no categories", feature.column));
            }

            let mut seen = HashSet::new();
            if let Some(dup) = feature.categories.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(format!(
                    "encoder column `{}` lists category `{}` twice",
                    feature.column, dup
                ));
            }

            let index = match &feature.fallback {
                Some(bucket) => Some(
                    feature
                        .categories
                        .iter()
                        .position(|c| c == bucket)
                        .ok_or_else(|| {
                            format!(
                                "fallback `{}` of encoder column `{}` is not one of its categories",
                                bucket, feature.column
                            )
                        })?,
                ),
                None => None,
            };
            fallback_index.push(index);

            output_columns.extend(
                feature
                    .categories
                    .iter()
                    .map(|c| indicator_name(&feature.column, c)),
            );
        }

        Ok(Self {
            features: params.features,
            fallback_index,
            output_columns,
        })
    }
}

impl From<OneHotEncoder> for EncoderParams {
    fn from(encoder: OneHotEncoder) -> Self {
        Self {
            features: encoder.features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_encoder;

    #[test]
    fn test_output_columns() {
        let encoder = sample_encoder();
        assert_eq!(
            encoder.output_columns(),
            &[
                "is_paid_False",
                "is_paid_True",
                "is_courier_0",
                "is_courier_1",
                "service_nnsz",
                "service_other",
                "payment_type_BAL",
                "payment_type_CRD",
                "payment_type_CSH",
                "payment_type_other",
            ]
        );
    }

    #[test]
    fn test_known_values() {
        let encoder = sample_encoder();
        let mut out = Vec::new();
        let mut fallbacks = Vec::new();
        encoder.encode_into(["False", "0", "nnsz", "CSH"], &mut out, &mut fallbacks);

        assert_eq!(out, vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(fallbacks.is_empty());
    }

    #[test]
    fn test_unknown_values_use_fallback_bucket() {
        let encoder = sample_encoder();
        let mut out = Vec::new();
        let mut fallbacks = Vec::new();
        encoder.encode_into(["True", "1", "express", "CRYPTO"], &mut out, &mut fallbacks);

        assert_eq!(out, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(fallbacks.len(), 2);
        assert_eq!(fallbacks[0].column, "service");
        assert_eq!(fallbacks[0].value, "express");
        assert_eq!(fallbacks[1].bucket.as_deref(), Some("other"));
    }

    #[test]
    fn test_unknown_without_bucket_is_all_zero() {
        let encoder = sample_encoder();
        let mut out = Vec::new();
        let mut fallbacks = Vec::new();
        encoder.encode_into(["False", "7", "nnsz", "CSH"], &mut out, &mut fallbacks);

        assert_eq!(&out[2..4], &[0.0, 0.0]);
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].bucket, None);
    }

    #[test]
    fn test_rejects_bad_fallback() {
        let mut features = serde_json::from_value::<EncoderParams>(
            serde_json::to_value(sample_encoder()).unwrap(),
        )
        .unwrap()
        .features;
        features[2].fallback = Some("misc".to_string());
        assert!(OneHotEncoder::new(features).is_err());
    }

    #[test]
    fn test_rejects_duplicate_category() {
        let mut features = serde_json::from_value::<EncoderParams>(
            serde_json::to_value(sample_encoder()).unwrap(),
        )
        .unwrap()
        .features;
        features[3].categories.push("CSH".to_string());
        let err = OneHotEncoder::new(features).unwrap_err();
        assert!(err.contains("twice"));
    }

    #[test]
    fn test_rejects_wrong_column_order() {
        let mut features = serde_json::from_value::<EncoderParams>(
            serde_json::to_value(sample_encoder()).unwrap(),
        )
        .unwrap()
        .features;
        features.swap(0, 1);
        assert!(OneHotEncoder::new(features).is_err());
    }
}
