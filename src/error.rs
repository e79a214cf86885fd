//! Error types for feature mapping and scoring

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoringError>;

/// Failures surfaced by the scoring core.
///
/// Unknown categorical values are deliberately absent: they resolve to a
/// fallback indicator and never fail a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// Missing or mistyped field, unparseable timestamp, bad batch shape
    #[error("malformed input at `{field}`: {reason}")]
    MalformedInput { field: String, reason: String },

    /// Mapper output does not line up with the classifier's feature list
    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Scaler, encoder or classifier could not be loaded
    #[error("failed to load {artifact} from {}: {reason}", path.display())]
    ArtifactLoad {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// Classifier invocation failed or produced an unusable score
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ScoringError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn artifact(artifact: &'static str, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactLoad {
            artifact,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Prefix the field path of a malformed-input error, e.g. with a batch index.
    pub fn within(self, prefix: &str) -> Self {
        match self {
            Self::MalformedInput { field, reason } => Self::MalformedInput {
                field: format!("{prefix}.{field}"),
                reason,
            },
            other => other,
        }
    }

    /// Whether the caller, rather than the deployment, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_prefixes_field() {
        let err = ScoringError::malformed("CreatedDate", "no offset").within("orders[3]");
        assert_eq!(
            err,
            ScoringError::MalformedInput {
                field: "orders[3].CreatedDate".to_string(),
                reason: "no offset".to_string(),
            }
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_within_leaves_other_errors() {
        let err = ScoringError::Inference("nan".to_string()).within("orders[0]");
        assert_eq!(err, ScoringError::Inference("nan".to_string()));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_artifact_message_names_path() {
        let err = ScoringError::artifact("scaler", "/models/scaler.json", "not found");
        assert_eq!(
            err.to_string(),
            "failed to load scaler from /models/scaler.json: not found"
        );
    }
}
