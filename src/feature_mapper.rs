//! Feature mapping from order records to classifier input.
//!
//! This module turns raw orders into the exact column layout the classifier
//! was trained on. A layout drift here does not raise, it just produces wrong
//! scores, so every vector is checked against the active `FeatureSchema`.

use crate::error::{Result, ScoringError};
use crate::models::{OneHotEncoder, StandardScaler};
use crate::schema::{
    FeatureSchema, PreprocessingPolicy, CATEGORICAL_COLUMNS, KNOWN_PAYMENT_TYPES, KNOWN_SERVICE,
    NUMERIC_COLUMNS, OTHER_CATEGORY,
};
use crate::types::OrderRecord;
use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::Serialize;

/// Timestamp layouts accepted besides RFC 3339
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// A categorical value outside the trained set, and where it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFallback {
    pub column: String,
    pub value: String,
    /// Indicator that absorbed the value; `None` when it encoded as all zeros
    pub bucket: Option<String>,
}

/// Calendar features in the order's own UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    /// Day of month, 1-31
    pub day: u32,
    /// Hour of day, 0-23
    pub hour: u32,
    /// Monday = 0
    pub weekday: u32,
}

impl CalendarFeatures {
    pub fn parse(raw: &str) -> Result<Self> {
        let timestamp = parse_timestamp(raw)?;
        Ok(Self {
            day: timestamp.day(),
            hour: timestamp.hour(),
            weekday: timestamp.weekday().num_days_from_monday(),
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp);
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| {
            ScoringError::malformed(
                "CreatedDate",
                format!("`{raw}` is not an ISO-8601 datetime with a UTC offset"),
            )
        })
}

/// Policy-independent view of one order: what both layouts are built from.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFeatures {
    pub user_id: f64,
    pub nm_id: f64,
    pub calendar: CalendarFeatures,
    pub is_paid: bool,
    pub is_courier: i64,
    /// Aggregates in `NUMERIC_COLUMNS` order
    pub numeric: [f64; NUMERIC_COLUMNS.len()],
    /// Encoder inputs in `CATEGORICAL_COLUMNS` order, rendered as the
    /// encoder was fitted on them
    pub categorical: [String; CATEGORICAL_COLUMNS.len()],
}

impl OrderFeatures {
    pub fn extract(order: &OrderRecord) -> Result<Self> {
        order.validate()?;
        let calendar = CalendarFeatures::parse(&order.created_date)?;

        Ok(Self {
            user_id: order.user_id as f64,
            nm_id: order.nm_id as f64,
            calendar,
            is_paid: order.is_paid,
            is_courier: order.is_courier,
            numeric: [
                order.total_ordered as f64,
                order.count_items as f64,
                order.unique_items as f64,
                order.avg_unique_purchase,
                order.nm_age as f64,
                order.distance as f64,
                order.days_after_registration as f64,
                order.number_of_orders as f64,
                order.number_of_ordered_items as f64,
                order.mean_number_of_ordered_items,
                order.min_number_of_ordered_items as f64,
                order.max_number_of_ordered_items as f64,
                order.mean_percent_of_ordered_items,
            ],
            categorical: [
                if order.is_paid { "True" } else { "False" }.to_string(),
                order.is_courier.to_string(),
                order.service.clone(),
                order.payment_type.clone(),
            ],
        })
    }

    fn payment_type(&self) -> &str {
        &self.categorical[3]
    }

    fn service(&self) -> &str {
        &self.categorical[2]
    }
}

/// Classifier input for one order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    pub fallbacks: Vec<CategoryFallback>,
}

impl FeatureVector {
    /// Look a value up by column name; test and debugging aid.
    pub fn get(&self, schema: &FeatureSchema, column: &str) -> Option<f64> {
        schema.position(column).and_then(|i| self.values.get(i).copied())
    }
}

/// Row-major batch of feature vectors, all of the schema's width
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    columns: usize,
    data: Vec<f64>,
    fallbacks: Vec<(usize, CategoryFallback)>,
}

impl FeatureMatrix {
    pub fn from_vectors(schema: &FeatureSchema, vectors: Vec<FeatureVector>) -> Result<Self> {
        let columns = schema.len();
        let rows = vectors.len();
        let mut data = Vec::with_capacity(rows * columns);
        let mut fallbacks = Vec::new();

        for (row, vector) in vectors.into_iter().enumerate() {
            schema.check_width(vector.values.len())?;
            data.extend(vector.values);
            fallbacks.extend(vector.fallbacks.into_iter().map(|f| (row, f)));
        }

        Ok(Self {
            rows,
            columns,
            data,
            fallbacks,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.columns..(index + 1) * self.columns]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics; a zero-width schema never reaches here
        self.data.chunks_exact(self.columns.max(1))
    }

    /// Flattened values as f32, the ONNX input layout
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32).collect()
    }

    /// Fallbacks taken while mapping, tagged with their row
    pub fn fallbacks(&self) -> &[(usize, CategoryFallback)] {
        &self.fallbacks
    }
}

enum Encoding {
    OneHot,
    Scaled {
        scaler: StandardScaler,
        encoder: OneHotEncoder,
    },
}

/// Maps order records to feature vectors under one preprocessing policy.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct FeatureMapper {
    encoding: Encoding,
    schema: FeatureSchema,
}

impl FeatureMapper {
    /// Raw aggregates plus fixed one-hot indicators; no fitted artifacts.
    pub fn one_hot() -> Self {
        Self {
            encoding: Encoding::OneHot,
            schema: FeatureSchema::one_hot(),
        }
    }

    /// Scaled aggregates plus fitted encoder output.
    pub fn scaled(scaler: StandardScaler, encoder: OneHotEncoder) -> Self {
        let schema = FeatureSchema::scaled(encoder.output_columns());
        Self {
            encoding: Encoding::Scaled { scaler, encoder },
            schema,
        }
    }

    pub fn policy(&self) -> PreprocessingPolicy {
        match self.encoding {
            Encoding::OneHot => PreprocessingPolicy::OneHot,
            Encoding::Scaled { .. } => PreprocessingPolicy::Scaled,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Map one order to its feature vector.
    pub fn map(&self, order: &OrderRecord) -> Result<FeatureVector> {
        let features = OrderFeatures::extract(order)?;

        let mut values = Vec::with_capacity(self.schema.len());
        let mut fallbacks = Vec::new();

        match &self.encoding {
            Encoding::OneHot => one_hot_into(&features, &mut values, &mut fallbacks),
            Encoding::Scaled { scaler, encoder } => {
                let calendar = features.calendar;
                values.extend([calendar.day as f64, calendar.hour as f64, calendar.weekday as f64]);
                scaler.transform_into(&features.numeric, &mut values);
                let [is_paid, is_courier, service, payment_type] = &features.categorical;
                encoder.encode_into(
                    [is_paid.as_str(), is_courier.as_str(), service.as_str(), payment_type.as_str()],
                    &mut values,
                    &mut fallbacks,
                );
            }
        }

        self.schema.check_width(values.len())?;
        Ok(FeatureVector { values, fallbacks })
    }

    /// Map a batch in input order; the first bad record rejects the batch.
    pub fn map_batch(&self, orders: &[OrderRecord]) -> Result<FeatureMatrix> {
        let vectors = orders
            .iter()
            .enumerate()
            .map(|(i, order)| self.map(order).map_err(|e| e.within(&format!("orders[{i}]"))))
            .collect::<Result<Vec<_>>>()?;

        FeatureMatrix::from_vectors(&self.schema, vectors)
    }
}

/// Writes the one-hot layout; indicator order follows `ONE_HOT_INDICATORS`.
fn one_hot_into(features: &OrderFeatures, values: &mut Vec<f64>, fallbacks: &mut Vec<CategoryFallback>) {
    let flag = |set: bool| if set { 1.0 } else { 0.0 };

    values.push(features.user_id);
    values.push(features.nm_id);
    values.extend(features.numeric);
    values.push(features.calendar.day as f64);
    values.push(features.calendar.hour as f64);

    let payment_type = features.payment_type();
    let known_payment = KNOWN_PAYMENT_TYPES.contains(&payment_type);
    values.extend(KNOWN_PAYMENT_TYPES.iter().map(|known| flag(payment_type == *known)));
    values.push(flag(!known_payment));
    if !known_payment {
        fallbacks.push(CategoryFallback {
            column: "payment_type".to_string(),
            value: payment_type.to_string(),
            bucket: Some(OTHER_CATEGORY.to_string()),
        });
    }

    values.push(flag(features.is_paid));
    values.push(flag(!features.is_paid));

    let service = features.service();
    values.push(flag(service == KNOWN_SERVICE));
    values.push(flag(service != KNOWN_SERVICE));
    if service != KNOWN_SERVICE {
        fallbacks.push(CategoryFallback {
            column: "service".to_string(),
            value: service.to_string(),
            bucket: Some(OTHER_CATEGORY.to_string()),
        });
    }

    let courier = features.is_courier;
    values.push(flag(courier == 1));
    values.push(flag(courier == 0));
    if courier != 0 && courier != 1 {
        fallbacks.push(CategoryFallback {
            column: "is_courier".to_string(),
            value: courier.to_string(),
            bucket: None,
        });
    }
}
