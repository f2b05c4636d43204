//! Configuration types and parsing for docshift.yml

use crate::error::{CoreError, CoreResult};
use crate::migration_def::MigrationDef;
use crate::names::CollectionName;
use crate::sequence::SequenceNumber;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration from docshift.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name of the deployment being migrated
    pub name: String,

    /// Document store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Collection holding the singleton checkpoint document
    #[serde(default = "default_status_collection")]
    pub status_collection: CollectionName,

    /// Documents pulled per cursor round trip
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// What the runner does when a unit fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Declarative migrations, in registry order
    #[serde(default)]
    pub migrations: Vec<MigrationDef>,
}

/// Store backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// DuckDB file or in-memory database (default)
    #[default]
    DuckDb,
    /// Process-local store, lost on exit
    Memory,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::DuckDb => write!(f, "duckdb"),
            StoreType::Memory => write!(f, "memory"),
        }
    }
}

/// Document store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(rename = "type", default)]
    pub store_type: StoreType,

    /// Database path (DuckDB file or `:memory:`)
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: default_store_path(),
        }
    }
}

/// Behaviour of the runner after a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure; remaining units stay pending (default)
    #[default]
    Halt,
    /// Record the failure and keep applying later units
    Continue,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Halt => write!(f, "halt"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

fn default_status_collection() -> CollectionName {
    CollectionName::new("_migration_status")
}

fn default_batch_size() -> usize {
    500
}

fn default_store_path() -> String {
    ":memory:".to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        log::debug!(
            "Loaded config '{}' with {} migration(s) from {}",
            config.name,
            config.migrations.len(),
            path.display()
        );
        Ok(config)
    }

    /// Load configuration from a directory.
    /// Looks for docshift.yml or docshift.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("docshift.yml");
        let yaml_path = dir.join("docshift.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "name cannot be empty".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "batch_size must be at least 1".to_string(),
            });
        }

        let mut previous = SequenceNumber::ZERO;
        for def in &self.migrations {
            if def.sequence <= previous {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "migration '{}' has sequence {} which does not follow {}",
                        def.name, def.sequence, previous
                    ),
                });
            }
            previous = def.sequence;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
