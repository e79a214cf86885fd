//! Shared fixtures for unit tests

use crate::feature_mapper::FeatureMapper;
use crate::models::encoder::EncodedColumn;
use crate::models::{LogisticClassifier, OneHotEncoder, Scorer, StandardScaler};
use crate::schema::{FeatureSchema, NUMERIC_COLUMNS};
use crate::types::{DecisionThreshold, OrderRecord};

/// Reference order in the storefront's PascalCase export
pub const SAMPLE_ORDER_JSON: &str = r#"{
    "user_id": 35434,
    "nm_id": 37225,
    "CreatedDate": "2025-03-02 16:13:47+03:00",
    "service": "nnsz",
    "total_ordered": 854,
    "PaymentType": "CSH",
    "IsPaid": false,
    "count_items": 0,
    "unique_items": 0,
    "avg_unique_purchase": 0.0,
    "is_courier": 0,
    "NmAge": 114,
    "Distance": 913,
    "DaysAfterRegistration": 1078,
    "number_of_orders": 1,
    "number_of_ordered_items": 854,
    "mean_number_of_ordered_items": 854.0,
    "min_number_of_ordered_items": 854,
    "max_number_of_ordered_items": 854,
    "mean_percent_of_ordered_items": 100.0
}"#;

pub fn sample_order() -> OrderRecord {
    OrderRecord {
        user_id: 35434,
        nm_id: 37225,
        created_date: "2025-03-02 16:13:47+03:00".to_string(),
        service: "nnsz".to_string(),
        total_ordered: 854,
        payment_type: "CSH".to_string(),
        is_paid: false,
        count_items: 0,
        unique_items: 0,
        avg_unique_purchase: 0.0,
        is_courier: 0,
        nm_age: 114,
        distance: 913,
        days_after_registration: 1078,
        number_of_orders: 1,
        number_of_ordered_items: 854,
        mean_number_of_ordered_items: 854.0,
        min_number_of_ordered_items: 854,
        max_number_of_ordered_items: 854,
        mean_percent_of_ordered_items: 100.0,
    }
}

/// total_ordered: mean 100, scale 10; the rest roughly order-of-magnitude
pub fn sample_scaler() -> StandardScaler {
    let mean = vec![100.0, 2.0, 2.0, 1.5, 90.0, 600.0, 700.0, 3.0, 120.0, 40.0, 20.0, 60.0, 55.0];
    let scale = vec![10.0, 3.0, 2.5, 1.0, 60.0, 400.0, 500.0, 4.0, 200.0, 80.0, 40.0, 120.0, 30.0];
    StandardScaler::new(
        NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
        mean,
        scale,
    )
    .expect("sample scaler is consistent")
}

pub fn sample_encoder() -> OneHotEncoder {
    let column = |name: &str, categories: &[&str], fallback: Option<&str>| EncodedColumn {
        column: name.to_string(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        fallback: fallback.map(str::to_string),
    };

    OneHotEncoder::new(vec![
        column("is_paid", &["False", "True"], None),
        column("is_courier", &["0", "1"], None),
        column("service", &["nnsz", "other"], Some("other")),
        column("payment_type", &["BAL", "CRD", "CSH", "other"], Some("other")),
    ])
    .expect("sample encoder is consistent")
}

fn weights_for(schema: &FeatureSchema, weights: &[(&str, f64)]) -> Vec<f64> {
    schema
        .columns()
        .iter()
        .map(|c| {
            weights
                .iter()
                .find(|(name, _)| name == c)
                .map(|(_, w)| *w)
                .unwrap_or(0.0)
        })
        .collect()
}

pub fn scaled_classifier() -> LogisticClassifier {
    let schema = FeatureSchema::scaled(sample_encoder().output_columns());
    let coefficients = weights_for(
        &schema,
        &[
            ("total_ordered", 0.02),
            ("count_items", -0.3),
            ("distance", 0.4),
            ("hour", 0.01),
            ("is_paid_False", 0.8),
            ("payment_type_CSH", 0.5),
            ("payment_type_other", 1.0),
        ],
    );
    LogisticClassifier::new(schema.columns().to_vec(), coefficients, -2.0)
        .expect("sample classifier is consistent")
}

pub fn one_hot_classifier() -> LogisticClassifier {
    let schema = FeatureSchema::one_hot();
    let coefficients = weights_for(
        &schema,
        &[
            ("total_ordered", 0.001),
            ("is_paid_False", 0.7),
            ("service_other", 0.4),
            ("payment_type_other", 1.2),
        ],
    );
    LogisticClassifier::new(schema.columns().to_vec(), coefficients, -1.5)
        .expect("sample classifier is consistent")
}

pub fn scaled_scorer() -> Scorer {
    Scorer::new(
        FeatureMapper::scaled(sample_scaler(), sample_encoder()),
        Box::new(scaled_classifier()),
        DecisionThreshold::default(),
    )
    .expect("sample artifacts agree on the schema")
}
