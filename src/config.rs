//! Configuration management for the property price service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Inference strategy for price prediction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStrategy {
    /// Use the primary model only
    #[default]
    Primary,
    /// Weighted mean over every model listed in `models.weights`
    Ensemble,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub encoders: EncodersConfig,
    pub prediction: PredictionConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind; the `PORT` environment variable takes precedence
    pub port: u16,
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing `<name>.json` model envelopes
    pub models_dir: String,
    /// Inference strategy: "primary" (single model) or "ensemble" (weighted mean)
    #[serde(default)]
    pub strategy: InferenceStrategy,
    /// Model used by the primary strategy
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    /// Ensemble weights, keyed by model name
    pub weights: HashMap<String, f64>,
    /// Expected artifact version. When unset, any version is accepted as long
    /// as models and encoders agree with each other.
    #[serde(default)]
    pub model_version: Option<String>,
}

fn default_primary_model() -> String {
    "random_forest".to_string()
}

/// Encoder table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodersConfig {
    /// Path to the encoder table JSON
    pub path: String,
    /// Features whose unseen values are rejected instead of falling back
    #[serde(default = "default_strict_features")]
    pub strict_features: Vec<String>,
}

fn default_strict_features() -> Vec<String> {
    vec!["City".to_string()]
}

/// Output formatting and inference limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// ISO currency code reported to callers
    pub currency: String,
    /// Symbol used in the display string
    pub currency_symbol: String,
    /// Upper bound on a single predict call, in milliseconds
    pub timeout_ms: u64,
    /// Raw predictions above this many lakhs are rescaled
    pub rescale_above_lakhs: Option<f64>,
    /// Divisor applied to predictions above `rescale_above_lakhs`
    pub rescale_factor: f64,
}

/// Periodic metrics summary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summaries in the log; 0 disables the reporter
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file, the environment and `PORT`.
    ///
    /// `PPS_CONFIG` selects another file. A missing file is not an error; the
    /// built-in defaults apply.
    pub fn load() -> Result<Self> {
        let path = std::env::var("PPS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let port = std::env::var("PORT").ok();
        Self::load_with(&path, port.as_deref())
    }

    /// Layer an optional file, `PPS__` environment variables and a raw `PORT`
    /// value over the defaults. `PORT` takes precedence over everything else.
    pub fn load_with(path: &str, port: Option<&str>) -> Result<Self> {
        let port = port
            .map(|raw| {
                raw.trim()
                    .parse::<u16>()
                    .with_context(|| format!("Invalid PORT value: {raw:?}"))
            })
            .transpose()?;

        let config = Config::builder()
            .add_source(Config::try_from(&Self::default()).context("Failed to encode defaults")?)
            .add_source(File::from(Path::new(path)).required(false))
            .add_source(
                Environment::with_prefix("PPS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("server.port", port.map(i64::from))
            .context("Failed to apply PORT override")?
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load configuration from a specific path, layered over the defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default()).context("Failed to encode defaults")?)
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert("random_forest".to_string(), 1.0);

        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            models: ModelsConfig {
                models_dir: "artifacts".to_string(),
                strategy: InferenceStrategy::Primary,
                primary_model: default_primary_model(),
                weights,
                model_version: None,
            },
            encoders: EncodersConfig {
                path: "artifacts/label_encoders.json".to_string(),
                strict_features: default_strict_features(),
            },
            prediction: PredictionConfig {
                currency: "INR".to_string(),
                currency_symbol: "₹".to_string(),
                timeout_ms: 1000,
                rescale_above_lakhs: Some(10_000.0),
                rescale_factor: 10.0,
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.models.strategy, InferenceStrategy::Primary);
        assert_eq!(config.models.primary_model, "random_forest");
        assert_eq!(config.encoders.strict_features, vec!["City".to_string()]);
        assert_eq!(config.prediction.currency, "INR");
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("pps-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8080

[models]
strategy = "ensemble"

[models.weights]
linear_regression = 0.3
random_forest = 0.7
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.models.strategy, InferenceStrategy::Ensemble);
        assert_eq!(config.models.weights.get("linear_regression"), Some(&0.3));
        assert_eq!(config.prediction.timeout_ms, 1000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load_from_path("does/not/exist.toml").is_err());
    }

    fn port_file(port: u16) -> (std::path::PathBuf, String) {
        let dir = std::env::temp_dir().join(format!("pps-port-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, format!("[server]\nport = {port}\n")).unwrap();
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    }

    #[test]
    fn test_port_overrides_file() {
        let (dir, path) = port_file(6000);

        let config = AppConfig::load_with(&path, Some("8081")).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.bind_address(), "0.0.0.0:8081");

        let config = AppConfig::load_with(&path, None).unwrap();
        assert_eq!(config.server.port, 6000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_absent_port_and_file_keep_default() {
        let config = AppConfig::load_with("does/not/exist.toml", None).unwrap();
        assert_eq!(config.server.port, 5000);

        let config = AppConfig::load_with("does/not/exist.toml", Some(" 7000 ")).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let (dir, path) = port_file(6000);

        for raw in ["abc", "", "70000", "-1"] {
            let err = AppConfig::load_with(&path, Some(raw)).unwrap_err();
            assert!(err.to_string().contains("Invalid PORT value"), "{raw}: {err}");
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
