//! Feature schema: the ordered column lists the classifier was trained on.
//!
//! Every column name used by the mapper and by the startup self-check comes
//! from the constants in this module. Nothing else spells out column names.

use crate::error::{Result, ScoringError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier columns, passed through only by the one-hot layout
pub const IDENTIFIER_COLUMNS: [&str; 2] = ["user_id", "nm_id"];

/// Behavioral aggregates, in training order
pub const NUMERIC_COLUMNS: [&str; 13] = [
    "total_ordered",
    "count_items",
    "unique_items",
    "avg_unique_purchase",
    "nm_age",
    "distance",
    "days_after_registration",
    "number_of_orders",
    "number_of_ordered_items",
    "mean_number_of_ordered_items",
    "min_number_of_ordered_items",
    "max_number_of_ordered_items",
    "mean_percent_of_ordered_items",
];

/// Calendar features derived from the order timestamp
pub const CALENDAR_COLUMNS: [&str; 3] = ["day", "hour", "weekday"];

/// Inputs to the fitted categorical encoder, in encoder order
pub const CATEGORICAL_COLUMNS: [&str; 4] = ["is_paid", "is_courier", "service", "payment_type"];

/// Payment types with a dedicated indicator in the one-hot layout
pub const KNOWN_PAYMENT_TYPES: [&str; 3] = ["CSH", "CRD", "BAL"];

/// The only service channel with a dedicated indicator
pub const KNOWN_SERVICE: &str = "nnsz";

/// Fallback bucket for categorical values outside the known set
pub const OTHER_CATEGORY: &str = "other";

/// Indicator columns of the one-hot layout, in training order
pub const ONE_HOT_INDICATORS: [&str; 10] = [
    "payment_type_CSH",
    "payment_type_CRD",
    "payment_type_BAL",
    "payment_type_other",
    "is_paid_True",
    "is_paid_False",
    "service_nnsz",
    "service_other",
    "is_courier_1",
    "is_courier_0",
];

/// How a record becomes a feature vector.
///
/// Exactly one policy is active per process. The two layouts are not
/// interchangeable: a classifier trained on one rejects the other at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingPolicy {
    /// Raw identifiers and aggregates plus fixed one-hot indicators
    OneHot,
    /// Scaled aggregates, weekday, and fitted encoder output
    #[default]
    Scaled,
}

impl PreprocessingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneHot => "one_hot",
            Self::Scaled => "scaled",
        }
    }
}

/// Name of an encoder output column, e.g. `payment_type_CSH`.
pub fn indicator_name(column: &str, category: &str) -> String {
    format!("{column}_{category}")
}

/// Ordered column list of one preprocessing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Layout of the raw one-hot policy (27 columns).
    pub fn one_hot() -> Self {
        let columns = IDENTIFIER_COLUMNS
            .iter()
            .chain(NUMERIC_COLUMNS.iter())
            .chain(CALENDAR_COLUMNS[..2].iter())
            .chain(ONE_HOT_INDICATORS.iter())
            .map(|c| c.to_string())
            .collect();
        Self { columns }
    }

    /// Layout of the scaled policy: calendar, scaled aggregates, then the
    /// fitted encoder's output columns.
    pub fn scaled(encoder_columns: &[String]) -> Self {
        let columns = CALENDAR_COLUMNS
            .iter()
            .chain(NUMERIC_COLUMNS.iter())
            .map(|c| c.to_string())
            .chain(encoder_columns.iter().cloned())
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Compare against the classifier's stored feature list, order-sensitive.
    pub fn verify(&self, expected: &[String]) -> Result<()> {
        if self.columns.as_slice() == expected {
            return Ok(());
        }

        let ours: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        let theirs: HashSet<&str> = expected.iter().map(String::as_str).collect();

        let mut missing: Vec<&str> = theirs.difference(&ours).copied().collect();
        let mut extra: Vec<&str> = ours.difference(&theirs).copied().collect();
        missing.sort_unstable();
        extra.sort_unstable();

        let detail = if !missing.is_empty() || !extra.is_empty() {
            format!(
                "mapper emits {} columns, classifier expects {}; not emitted: {:?}; unexpected: {:?}",
                self.columns.len(),
                expected.len(),
                missing,
                extra
            )
        } else if self.columns.len() != expected.len() {
            let mut seen = HashSet::new();
            let mut repeated: Vec<&str> = expected
                .iter()
                .map(String::as_str)
                .filter(|name| !seen.insert(*name))
                .collect();
            repeated.sort_unstable();
            repeated.dedup();
            format!(
                "mapper emits {} columns, classifier expects {}; repeated in classifier list: {:?}",
                self.columns.len(),
                expected.len(),
                repeated
            )
        } else {
            let index = self
                .columns
                .iter()
                .zip(expected)
                .position(|(a, b)| a != b)
                .unwrap_or(0);
            format!(
                "column order differs at position {}: mapper emits `{}`, classifier expects `{}`",
                index,
                self.columns.get(index).map(String::as_str).unwrap_or(""),
                expected.get(index).map(String::as_str).unwrap_or("")
            )
        };

        Err(ScoringError::SchemaMismatch(detail))
    }

    /// Assert a single vector's width against the schema.
    pub fn check_width(&self, width: usize) -> Result<()> {
        if width == self.columns.len() {
            Ok(())
        } else {
            Err(ScoringError::SchemaMismatch(format!(
                "feature vector has {} values, schema has {} columns",
                width,
                self.columns.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_hot_layout() {
        let schema = FeatureSchema::one_hot();
        assert_eq!(schema.len(), 27);
        assert_eq!(schema.columns()[0], "user_id");
        assert_eq!(schema.columns()[15], "day");
        assert_eq!(schema.columns()[16], "hour");
        assert_eq!(schema.columns()[26], "is_courier_0");
        assert_eq!(schema.position("weekday"), None);
    }

    #[test]
    fn test_scaled_layout() {
        let encoder_columns = names(&["is_paid_False", "is_paid_True"]);
        let schema = FeatureSchema::scaled(&encoder_columns);
        assert_eq!(schema.len(), 3 + 13 + 2);
        assert_eq!(&schema.columns()[..3], &names(&["day", "hour", "weekday"])[..]);
        assert_eq!(schema.columns()[3], "total_ordered");
        assert_eq!(schema.columns()[17], "is_paid_True");
        assert_eq!(schema.position("user_id"), None);
    }

    #[test]
    fn test_verify_accepts_identical() {
        let schema = FeatureSchema::one_hot();
        assert!(schema.verify(&schema.columns().to_vec()).is_ok());
    }

    #[test]
    fn test_verify_reports_missing_and_extra() {
        let schema = FeatureSchema::one_hot();
        let mut expected = schema.columns().to_vec();
        expected.pop();
        expected.push("weekday".to_string());

        match schema.verify(&expected) {
            Err(ScoringError::SchemaMismatch(detail)) => {
                assert!(detail.contains("weekday"));
                assert!(detail.contains("is_courier_0"));
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_is_order_sensitive() {
        let schema = FeatureSchema::one_hot();
        let mut expected = schema.columns().to_vec();
        expected.swap(0, 1);

        match schema.verify(&expected) {
            Err(ScoringError::SchemaMismatch(detail)) => {
                assert!(detail.contains("position 0"), "{detail}");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_reports_repeated_column() {
        let schema = FeatureSchema::one_hot();
        let mut expected = schema.columns().to_vec();
        expected.push("distance".to_string());

        match schema.verify(&expected) {
            Err(ScoringError::SchemaMismatch(detail)) => {
                assert!(detail.contains("repeated"), "{detail}");
                assert!(detail.contains("distance"), "{detail}");
                assert!(!detail.contains("position"), "{detail}");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_check_width() {
        let schema = FeatureSchema::one_hot();
        assert!(schema.check_width(27).is_ok());
        assert!(schema.check_width(26).is_err());
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(PreprocessingPolicy::default(), PreprocessingPolicy::Scaled);
        let policy: PreprocessingPolicy = serde_json::from_str("\"one_hot\"").unwrap();
        assert_eq!(policy, PreprocessingPolicy::OneHot);
        assert_eq!(policy.as_str(), "one_hot");
    }
}
