//! Runtime context for CLI commands

use anyhow::{Context, Result};
use ds_core::Config;
use ds_migrate::{registry_from_defs, MigrationRegistry, MigrationRunner};
use ds_store::DocumentStore;
use std::path::Path;
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Loaded configuration plus an open store connection
pub struct RuntimeContext {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
}

impl RuntimeContext {
    /// Create a new runtime context from global arguments
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let mut config = load_config(args)?;
        if let Some(path) = &args.store {
            config.store.path = path.clone();
        }

        let store = ds_store::connect(&config.store).with_context(|| {
            format!(
                "Failed to connect to {} store at {}",
                config.store.store_type, config.store.path
            )
        })?;
        log::debug!(
            "Loaded config '{}' with {} store at {}",
            config.name,
            store.store_type(),
            config.store.path
        );

        Ok(Self { config, store })
    }

    /// Registry built from the declarative migrations in the config
    pub fn registry(&self) -> Result<MigrationRegistry> {
        registry_from_defs(&self.config.migrations).context("Invalid migration definitions")
    }

    /// Runner configured from the loaded config
    pub fn runner(&self) -> Result<MigrationRunner> {
        Ok(MigrationRunner::from_config(
            &self.config,
            self.registry()?,
            Arc::clone(&self.store),
        ))
    }
}

/// Load config from a custom path or the project directory
pub fn load_config(args: &GlobalArgs) -> Result<Config> {
    match &args.config {
        Some(path) => Config::load(Path::new(path)).context("Failed to load configuration file"),
        None => Config::load_from_dir(Path::new(&args.project_dir))
            .context("Failed to load project configuration"),
    }
}
