//! Configuration for the warehouse load.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use enem_core::config::require_non_empty;
use enem_core::{ConfigError, ErrorHandlingConfig, MetricsConfig, StageConfig, StorageConfig};

/// The parts of the shared config document the gold stage reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub gold: GoldConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// How the groups to load are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Scan the objects under the source prefix; each folder is a group.
    #[default]
    Discover,
    /// Read the manifest the silver stage wrote.
    Manifest,
    /// Use the configured `groups` list.
    Declared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoldConfig {
    /// Silver prefix holding one folder per group, e.g. `silver/parquet`.
    pub source_prefix: String,
    pub project_id: String,
    pub dataset_id: String,
    #[serde(default)]
    pub discovery: DiscoveryMode,
    /// Groups to load in `declared` mode.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Location the load jobs run in. Defaults to the dataset's.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl GoldConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("gold.source_prefix", &self.source_prefix),
            ("gold.project_id", &self.project_id),
            ("gold.dataset_id", &self.dataset_id),
        ] {
            if let Err(e) = require_non_empty(field, value) {
                errors.push(e.to_string());
            }
        }

        if self.discovery == DiscoveryMode::Declared && self.groups.is_empty() {
            errors.push(
                ConfigError::EmptyField {
                    field: "gold.groups".to_string(),
                }
                .to_string(),
            );
        }

        if self.poll_interval_secs == 0 {
            errors.push("gold.poll_interval_secs must be at least 1".to_string());
        }

        match errors.len() {
            0 => Ok(()),
            _ => Err(ConfigError::MultipleErrors { errors }),
        }
    }
}

impl StageConfig for Config {
    const STAGE: &'static str = "gold";

    fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.gold.validate()
    }

    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    fn log_startup_info(&self) {
        let gold = &self.gold;
        info!(
            "Loading {} into {}.{} (discovery: {:?})",
            gold.source_prefix, gold.project_id, gold.dataset_id, gold.discovery
        );
        if gold.discovery == DiscoveryMode::Declared {
            info!("  Groups: {}", gold.groups.join(", "));
        }
    }
}
