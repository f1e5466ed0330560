//! enem-gold: silver column groups to warehouse tables.
//!
//! Each group found under the silver prefix is loaded into a like-named
//! table with a full-replace load job. Groups are found by scanning the
//! prefix, from the silver manifest, or from a declared list.

pub mod config;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod warehouse;

pub use config::{Config, DiscoveryMode, GoldConfig};
pub use discovery::{GroupSources, GroupedPaths, group_paths, resolve_groups};
pub use error::{DiscoveryError, PipelineError, WarehouseError};
pub use loader::{GroupOutcome, LoadReport, Loader};
pub use warehouse::{BigQueryWarehouse, LoadJob, TableRef, Warehouse, validate_table_name};

// Re-export core items used by the binary
pub use enem_core::{Application, CliArgs};

/// Run the load described by `config` against BigQuery.
pub async fn run(config: Config) -> Result<LoadReport, PipelineError> {
    let storage = enem_core::StorageProvider::connect(&config.storage).await?;
    let warehouse = BigQueryWarehouse::connect(
        config.storage.credentials_path.as_deref(),
        config.gold.location.clone(),
        config.gold.poll_interval(),
    )
    .await?;

    Loader::new(storage, config.gold, warehouse, &config.error_handling)
        .run()
        .await
}
