//! Configuration management for the scoring service

use crate::schema::PreprocessingPolicy;
use crate::types::DecisionThreshold;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Locations of the training artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Fitted scaler; required by the scaled policy
    pub scaler_path: Option<PathBuf>,
    /// Fitted encoder; required by the scaled policy
    pub encoder_path: Option<PathBuf>,
    /// Classifier manifest
    pub classifier_path: PathBuf,
    /// Number of threads for ONNX inference
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Probability above which an order is flagged
    #[serde(default)]
    pub threshold: DecisionThreshold,
    /// Feature layout the classifier was trained on
    #[serde(default)]
    pub policy: PreprocessingPolicy,
    /// Largest batch accepted in one request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_max_batch_size() -> usize {
    1000
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DecisionThreshold::default(),
            policy: PreprocessingPolicy::default(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,
    /// Single-line text
    Compact,
    /// One JSON object per event
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file plus environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// `FRAUD__DETECTION__THRESHOLD=0.7` style variables override the file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FRAUD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scorer cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.detection.max_batch_size == 0 {
            anyhow::bail!("detection.max_batch_size must be at least 1");
        }

        if self.detection.policy == PreprocessingPolicy::Scaled {
            if self.artifacts.scaler_path.is_none() {
                anyhow::bail!("artifacts.scaler_path is required by the scaled policy");
            }
            if self.artifacts.encoder_path.is_none() {
                anyhow::bail!("artifacts.encoder_path is required by the scaled policy");
            }
        }

        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.server.host, self.server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that load configuration, since loading reads the
    /// process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn load(path: &Path) -> Result<AppConfig> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        AppConfig::load_from_path(path)
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_defaults() {
        let file = write_config(
            r#"
            [artifacts]
            scaler_path = "artifacts/scaler.json"
            encoder_path = "artifacts/encoder.json"
            classifier_path = "artifacts/classifier.json"
            "#,
        );

        let config = load(file.path()).unwrap();
        assert_eq!(config.detection.threshold.value(), 0.5);
        assert_eq!(config.detection.policy, PreprocessingPolicy::Scaled);
        assert_eq!(config.detection.max_batch_size, 1000);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.artifacts.onnx_threads, 1);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_one_hot_needs_only_classifier() {
        let file = write_config(
            r#"
            [artifacts]
            classifier_path = "artifacts/classifier_one_hot.json"

            [detection]
            policy = "one_hot"
            threshold = 0.7
            "#,
        );

        let config = load(file.path()).unwrap();
        assert_eq!(config.detection.policy, PreprocessingPolicy::OneHot);
        assert_eq!(config.detection.threshold.value(), 0.7);
    }

    #[test]
    fn test_scaled_requires_scaler_and_encoder() {
        let file = write_config(
            r#"
            [artifacts]
            classifier_path = "artifacts/classifier.json"
            "#,
        );

        let err = load(file.path()).unwrap_err();
        assert!(err.to_string().contains("scaler_path"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let file = write_config(
            r#"
            [artifacts]
            classifier_path = "artifacts/classifier_one_hot.json"

            [detection]
            policy = "one_hot"
            threshold = 1.5
            "#,
        );

        assert!(load(file.path()).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config(
            r#"
            [artifacts]
            classifier_path = "artifacts/classifier_one_hot.json"

            [detection]
            policy = "one_hot"
            threshold = 0.5
            "#,
        );

        let config = {
            let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            std::env::set_var("FRAUD__DETECTION__THRESHOLD", "0.7");
            let config = AppConfig::load_from_path(file.path());
            std::env::remove_var("FRAUD__DETECTION__THRESHOLD");
            config.unwrap()
        };

        assert_eq!(config.detection.threshold.value(), 0.7);
        assert_eq!(config.detection.policy, PreprocessingPolicy::OneHot);
    }

    #[test]
    fn test_log_format_parsed() {
        let file = write_config(
            r#"
            [artifacts]
            classifier_path = "artifacts/classifier_one_hot.json"

            [detection]
            policy = "one_hot"

            [logging]
            format = "json"
            "#,
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");

        let file = write_config(
            r#"
            [artifacts]
            classifier_path = "artifacts/classifier_one_hot.json"

            [detection]
            policy = "one_hot"

            [logging]
            format = "fancy"
            "#,
        );
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
