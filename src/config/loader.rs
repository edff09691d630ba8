//! Configuration Loader
//!
//! Layers an optional configuration file (TOML, YAML or JSON, chosen by
//! extension) under environment overrides of the form
//! `ACQUISITION__<SECTION>__<KEY>`, then deserializes and validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::AcquisitionConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "ACQUISITION";
const ENV_SEPARATOR: &str = "__";

/// Loaded and validated configuration, shared by every component of a session
#[derive(Debug)]
pub struct ConfigManager {
    config: AcquisitionConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from defaults and environment overrides only
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::build(None)
    }

    /// Load configuration from a file that must exist, plus environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::build(Some(path))
    }

    /// Wrap an already-built configuration (tests, embedding applications)
    pub fn from_config(config: AcquisitionConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source: None,
        }))
    }

    fn build(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("packet_capture.args")
                .with_list_parse_key("screen_recorder.args"),
        );

        let config: AcquisitionConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        let source_display = path.map(|p| p.display().to_string());
        info!(
            source = source_display.as_deref(),
            timestamp_enabled = config.timestamp.enabled,
            pec_enabled = config.pec.enabled,
            "⚙️ CONFIG: Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source: path.map(Path::to_path_buf),
        }))
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Configuration as JSON with credentials masked, for logs and diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or_default();
        sanitize_json_recursive(&mut value, &["password", "secret", "token"]);
        value
    }
}

fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = sensitive_patterns
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if is_sensitive {
                    if let serde_json::Value::String(s) = val {
                        *val = if s.is_empty() {
                            serde_json::Value::String("[EMPTY]".to_string())
                        } else {
                            serde_json::Value::String("[MASKED]".to_string())
                        };
                    }
                } else {
                    sanitize_json_recursive(val, sensitive_patterns);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}
