//! enem-core: shared components for the bronze, silver and gold stages.
//!
//! Each stage is its own binary, and the stages only meet through the
//! storage namespace. What they have in common lives here:
//!
//! - `storage/` - Object storage access (GCS, S3, local filesystem)
//! - `config/` - YAML loading, multi-file merge and environment variable interpolation
//! - `metrics/` - Metric events and the Prometheus textfile export
//! - `table` - In-memory Arrow tables and their Parquet/CSV codecs
//! - `manifest` - The silver manifest handed from transformation to load
//! - `outcome` - Per-unit statuses, run outcomes and the failure budget
//! - `error` - Common error types
//! - `app` - Application abstraction for reducing main.rs boilerplate

pub mod app;
pub mod config;
pub mod error;
pub mod manifest;
pub mod metrics;
pub mod outcome;
pub mod storage;
pub mod table;
pub mod tracing;

// Re-export commonly used items
pub use app::{Application, Reportable, StageConfig};
pub use config::{
    CliArgs, ConfigArgs, ConfigPath, CsvEncoding, ErrorHandlingConfig, KB, MB, MetricsConfig,
    ParquetCompression, StorageConfig, load_from_paths,
};
pub use error::{
    ConfigError, CsvError, ManifestError, MetricsError, ParquetError, StorageError,
};
pub use manifest::{MANIFEST_FILE_NAME, SilverManifest};
pub use outcome::{FailureBudget, RunOutcome, UnitStatus};
pub use storage::StorageProvider;
pub use table::Table;
pub use crate::tracing::init_tracing;
