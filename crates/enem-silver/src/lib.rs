//! enem-silver: bronze shards to column-group Parquet files.
//!
//! Reads every bronze shard matching the configured prefix, drops the
//! column denylist and writes one file per (shard, group) under the silver
//! prefix, plus a manifest of what was written.

pub mod columns;
pub mod config;
pub mod error;
pub mod source;
pub mod transform;

pub use config::{ColumnGroups, Config, InputFormat, SilverConfig};
pub use error::{PipelineError, TransformError};
pub use source::{SourceShard, resolve_sources};
pub use transform::{GroupFile, ShardOutcome, TransformReport, Transformer, group_path};

// Re-export core items used by the binary
pub use enem_core::{Application, CliArgs};

/// Run the transformation described by `config`.
pub async fn run(config: Config) -> Result<TransformReport, PipelineError> {
    Transformer::from_config(config).await?.run().await
}
