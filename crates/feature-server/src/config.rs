//! Server Configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `ODFV_`
//! prefixed environment variables.

use derivation_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines instead of text
    pub json_logs: bool,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
    pub max_batch_rows: usize,
    /// Default output naming for derive responses
    pub full_feature_names: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:6566".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            max_batch_rows: EngineConfig::default().max_batch_rows,
            full_feature_names: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration, reading `path` if it exists
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix("ODFV").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_batch_rows: self.max_batch_rows,
        }
    }

    /// Config for tests: no metrics recorder
    pub fn for_testing() -> Self {
        Self {
            metrics_enabled: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join("odfv-server-config-test.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "max_batch_rows = 10\nfull_feature_names = true").unwrap();

        let config = ServerConfig::load(path.to_str()).unwrap();
        assert_eq!(config.max_batch_rows, 10);
        assert!(config.full_feature_names);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine_config().max_batch_rows, 10);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_is_optional() {
        let config = ServerConfig::load(Some("/nonexistent/odfv")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }
}
