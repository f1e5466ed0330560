//! enem-bronze: raw ENEM files into the bronze tier.
//!
//! `ingest` copies configured local files and directories into the bucket
//! byte for byte. `chunk` splits the large microdata CSV into numbered
//! Parquet shards on local disk, ready for a directory upload.

pub mod chunk;
pub mod config;
pub mod error;
pub mod upload;

use clap::Subcommand;

pub use chunk::{ChunkFile, ChunkReport, chunk_csv, chunk_file_name};
pub use config::{BronzeConfig, ChunkingConfig, Config, DirectoryUpload, FileUpload};
pub use error::{IngestError, PipelineError};
pub use upload::{
    IngestReport, Ingester, UploadOutcome, UploadTask, directory_tasks, upload_directory,
    upload_file,
};

// Re-export core items used by the binary
pub use enem_core::{Application, ConfigArgs};

use enem_core::{ConfigError, Reportable, RunOutcome, StorageProvider};

/// What a bronze invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Upload the configured files and directories
    Ingest,
    /// Split the configured CSV into Parquet shards
    Chunk,
}

/// Result of either bronze command.
#[derive(Debug, Clone)]
pub enum BronzeReport {
    Ingest(IngestReport),
    Chunk(ChunkReport),
}

impl Reportable for BronzeReport {
    fn outcome(&self) -> RunOutcome {
        match self {
            BronzeReport::Ingest(report) => report.outcome(),
            BronzeReport::Chunk(report) => report.outcome(),
        }
    }
}

/// Run `command` with the loaded `config`.
pub async fn run(config: Config, command: Command) -> Result<BronzeReport, PipelineError> {
    match command {
        Command::Ingest => {
            let storage = StorageProvider::connect(&config.storage).await?;
            let report = Ingester::new(storage, config.bronze, &config.error_handling)
                .run()
                .await?;
            Ok(BronzeReport::Ingest(report))
        }
        Command::Chunk => {
            let chunking = config.bronze.chunking.ok_or_else(|| ConfigError::EmptyField {
                field: "bronze.chunking".to_string(),
            })?;
            let report = chunk::chunk_csv_blocking(chunking).await?;
            Ok(BronzeReport::Chunk(report))
        }
    }
}
