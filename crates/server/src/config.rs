//! Server configuration

use anyhow::{ensure, Context, Result};
use cloudopt_lib::recommend::DEFAULT_IDLE_THRESHOLD;
use cloudopt_lib::store::{BusyRange, DEFAULT_BUSY_MAX, DEFAULT_BUSY_MIN};
use cloudopt_lib::DEFAULT_ACTOR;
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration, read from `CLOUDOPT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Audit journal file; state is kept in memory only when unset
    #[serde(default)]
    pub journal_path: Option<PathBuf>,

    /// Usage ledger snapshot file; in memory only when unset
    #[serde(default)]
    pub usage_path: Option<PathBuf>,

    /// Utilization below which a resource is idle
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold: f64,

    /// Lower bound of busy utilization draws
    #[serde(default = "default_busy_min")]
    pub busy_min: u32,

    /// Upper bound of busy utilization draws
    #[serde(default = "default_busy_max")]
    pub busy_max: u32,

    /// Actor recorded when a request names none
    #[serde(default = "default_actor")]
    pub default_actor: String,

    /// Reinstall the demo resources on startup
    #[serde(default = "default_reseed_on_start")]
    pub reseed_on_start: bool,

    /// Fixed RNG seed for reproducible busy draws
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_api_port() -> u16 {
    8000
}

fn default_idle_threshold() -> f64 {
    DEFAULT_IDLE_THRESHOLD
}

fn default_busy_min() -> u32 {
    DEFAULT_BUSY_MIN
}

fn default_busy_max() -> u32 {
    DEFAULT_BUSY_MAX
}

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

fn default_reseed_on_start() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            journal_path: None,
            usage_path: None,
            idle_threshold: default_idle_threshold(),
            busy_min: default_busy_min(),
            busy_max: default_busy_max(),
            default_actor: default_actor(),
            reseed_on_start: default_reseed_on_start(),
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CLOUDOPT").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid CLOUDOPT_* configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.idle_threshold.is_finite() && self.idle_threshold >= 0.0,
            "idle_threshold must be a non-negative number, got {}",
            self.idle_threshold
        );
        ensure!(
            self.busy_min <= self.busy_max,
            "busy_min ({}) must not exceed busy_max ({})",
            self.busy_min,
            self.busy_max
        );
        ensure!(
            !self.default_actor.trim().is_empty(),
            "default_actor must not be empty"
        );
        Ok(())
    }

    pub fn busy_range(&self) -> BusyRange {
        BusyRange::new(self.busy_min, self.busy_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_demo_behavior() {
        let config = ServerConfig::default();
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.idle_threshold, 5.0);
        assert_eq!(config.busy_range(), BusyRange::new(20, 90));
        assert_eq!(config.default_actor, "demo-user");
        assert!(config.reseed_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let inverted = ServerConfig {
            busy_min: 80,
            busy_max: 10,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let negative = ServerConfig {
            idle_threshold: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }
}
