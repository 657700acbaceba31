//! Configuration loading.
//!
//! Sources, later ones winning:
//! 1. Defaults in code
//! 2. `config/almox.toml` (optional)
//! 3. Environment variables with the `ALMOX__` prefix, e.g. `ALMOX__SERVER__PORT=9000`

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use almox_infra::EngineConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config/almox";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Stock engine retry policy.
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub baskets: BasketConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasketConfig {
    /// Sessions untouched for this long are dropped when the next one opens.
    pub idle_timeout_secs: u64,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load with `file` (extension optional) as the file source.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();

        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("engine.max_retries", i64::from(defaults.max_retries))?
            .set_default("engine.retry_backoff_ms", defaults.retry_backoff_ms)?
            .set_default("log.filter", "info")?
            .set_default("baskets.idle_timeout_secs", 1800)?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("ALMOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from("does/not/exist/almox").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.baskets.idle_timeout_secs, 1800);
    }

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("almox-config-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[engine]\nmax_retries = 7\n\n[baskets]\nidle_timeout_secs = 60\n",
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.engine.max_retries, 7);
        assert_eq!(config.engine.retry_backoff_ms, EngineConfig::default().retry_backoff_ms);
        assert_eq!(config.baskets.idle_timeout_secs, 60);
        assert_eq!(config.bind_addr(), "0.0.0.0:9100");
    }
}
