//! Order record accepted for fraud scoring

use crate::error::{Result, ScoringError};
use serde::{Deserialize, Serialize};

/// One order to be scored.
///
/// Two client generations send this record: one with the storefront's
/// PascalCase export names (`CreatedDate`, `PaymentType`, `NmAge`, ...) and
/// one fully snake_case. Both deserialize into the same record; serialization
/// uses the PascalCase names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Buyer identifier
    pub user_id: i64,

    /// Item (nomenclature) identifier
    pub nm_id: i64,

    /// Order creation time, ISO-8601 with UTC offset
    #[serde(rename = "CreatedDate", alias = "created_date")]
    pub created_date: String,

    /// Service channel code (`nnsz` or other)
    pub service: String,

    /// Units ordered by the buyer in total
    pub total_ordered: i64,

    /// Payment method code (`CSH`, `CRD`, `BAL` or other)
    #[serde(rename = "PaymentType", alias = "payment_type")]
    pub payment_type: String,

    /// Whether the order was paid up front
    #[serde(rename = "IsPaid", alias = "is_paid")]
    pub is_paid: bool,

    pub count_items: i64,

    pub unique_items: i64,

    pub avg_unique_purchase: f64,

    /// Courier delivery flag (0 or 1)
    pub is_courier: i64,

    /// Age of the item listing in days
    #[serde(rename = "NmAge", alias = "nm_age")]
    pub nm_age: i64,

    /// Distance between warehouse and pickup point
    #[serde(rename = "Distance", alias = "distance")]
    pub distance: i64,

    #[serde(rename = "DaysAfterRegistration", alias = "days_after_registration")]
    pub days_after_registration: i64,

    pub number_of_orders: i64,

    pub number_of_ordered_items: i64,

    pub mean_number_of_ordered_items: f64,

    pub min_number_of_ordered_items: i64,

    pub max_number_of_ordered_items: i64,

    /// Historical share of ordered items, in percent
    pub mean_percent_of_ordered_items: f64,
}

impl OrderRecord {
    /// Check the constraints serde cannot express.
    ///
    /// JSON has no NaN or infinity, but records built in code or read from
    /// other sources can carry them.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("avg_unique_purchase", self.avg_unique_purchase),
            ("mean_number_of_ordered_items", self.mean_number_of_ordered_items),
            ("mean_percent_of_ordered_items", self.mean_percent_of_ordered_items),
        ];

        for (field, value) in floats {
            if !value.is_finite() {
                return Err(ScoringError::malformed(
                    field,
                    format!("expected a finite number, got {value}"),
                ));
            }
        }

        Ok(())
    }

    /// Parse a single record from JSON, mapping decode failures to
    /// `MalformedInput` naming the offending field.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_slice(bytes);
        let record: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(decode_error)?;
        deserializer
            .end()
            .map_err(|e| ScoringError::malformed("body", e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Parse a JSON array of records; a bad element rejects the whole batch.
    pub fn batch_from_json_slice(bytes: &[u8]) -> Result<Vec<Self>> {
        let values: Vec<serde_json::Value> =
            serde_json::from_slice(bytes).map_err(|e| ScoringError::malformed("orders", e.to_string()))?;

        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let record: Self = serde_path_to_error::deserialize(value)
                    .map_err(|e| decode_error(e).within(&format!("orders[{i}]")))?;
                record
                    .validate()
                    .map_err(|e| e.within(&format!("orders[{i}]")))?;
                Ok(record)
            })
            .collect()
    }
}

/// Translate a decode failure into `MalformedInput`.
///
/// The error path names mistyped fields. A missing field fails at the
/// enclosing object, so its name is lifted from serde's message
/// (``missing field `IsPaid` ``) instead.
fn decode_error(err: serde_path_to_error::Error<serde_json::Error>) -> ScoringError {
    let path = err.path().to_string();
    let message = err.into_inner().to_string();

    let named = message
        .split('`')
        .nth(1)
        .filter(|_| message.starts_with("missing field") || message.starts_with("unknown field"));

    let field = match (named, path.as_str()) {
        (Some(name), ".") => name.to_string(),
        (Some(name), parent) => format!("{parent}.{name}"),
        (None, ".") => "body".to_string(),
        (None, path) => path.to_string(),
    };
    ScoringError::malformed(field, message)
}
