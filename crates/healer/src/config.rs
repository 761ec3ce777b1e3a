//! Healer configuration

use anyhow::Result;
use serde::Deserialize;

/// Healer configuration, read from `HEALER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct HealerConfig {
    /// HTTP API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Replace cluster mutations with DRY_RUN audit records
    #[serde(default)]
    pub dry_run: bool,

    /// Seconds between control loop ticks
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_check_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            dry_run: false,
            check_interval: default_check_interval(),
            log_level: default_log_level(),
        }
    }
}

impl HealerConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("HEALER").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = HealerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(!config.dry_run);
        assert_eq!(config.check_interval, 30);
        assert_eq!(config.log_level, "info");
    }
}
