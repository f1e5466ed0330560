//! Splitting a large CSV into numbered Parquet shards.
//!
//! The CSV is streamed one chunk at a time, so only `rows_per_chunk` rows
//! are resident. Shards are named `{stem}_chunk_{n}.parquet`, counting
//! from 1, and land in a local directory ready for directory upload.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tracing::{debug, info};

use enem_core::emit;
use enem_core::error::CsvDecodeSnafu;
use enem_core::metrics::events::ChunkWritten;
use enem_core::table::{csv_reader, infer_csv_schema, write_parquet};
use enem_core::{Reportable, RunOutcome, UnitStatus};

use crate::config::ChunkingConfig;
use crate::error::{
    ChunkTaskSnafu, DelimiterSnafu, EncodeChunkSnafu, IngestError, OpenCsvSnafu,
    ReadCsvSnafu, ReadDirectorySnafu, WriteChunkSnafu,
};

/// One shard written by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// Result of chunking one CSV.
#[derive(Debug, Clone, Default)]
pub struct ChunkReport {
    pub chunks: Vec<ChunkFile>,
}

impl ChunkReport {
    pub fn rows(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.rows).sum()
    }
}

impl Reportable for ChunkReport {
    fn outcome(&self) -> RunOutcome {
        RunOutcome::classify(self.chunks.iter().map(|_| UnitStatus::Success))
    }
}

/// Shard file name for chunk `index` (1-based) of the CSV named `stem`.
pub fn chunk_file_name(stem: &str, index: usize) -> String {
    format!("{stem}_chunk_{index}.parquet")
}

/// Split `config.source` into Parquet shards under `config.output_dir`.
pub fn chunk_csv(config: &ChunkingConfig) -> Result<ChunkReport, IngestError> {
    let source = &config.source;
    let delimiter = config.delimiter_byte().context(DelimiterSnafu)?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chunk".to_string());

    let mut file = File::open(source).context(OpenCsvSnafu { path: source })?;
    let schema = infer_csv_schema(
        &mut file,
        delimiter,
        config.encoding,
        config.infer_schema_rows,
    )
        .context(ReadCsvSnafu { path: source })?;
    debug!(columns = schema.fields().len(), "Inferred CSV schema");

    std::fs::create_dir_all(&config.output_dir).context(WriteChunkSnafu {
        path: &config.output_dir,
    })?;
    remove_stale_chunks(&config.output_dir, &stem)?;

    let reader = csv_reader(
        BufReader::new(file),
        schema.clone(),
        delimiter,
        config.encoding,
        config.rows_per_chunk,
    )
    .context(ReadCsvSnafu { path: source })?;

    let mut report = ChunkReport::default();
    for (offset, batch) in reader.enumerate() {
        let index = offset + 1;
        let batch = batch
            .context(CsvDecodeSnafu)
            .context(ReadCsvSnafu { path: source })?;
        let rows = batch.num_rows();

        let encoded = write_parquet(schema.clone(), &[batch], config.compression)
            .context(EncodeChunkSnafu { index })?;
        let path = config.output_dir.join(chunk_file_name(&stem, index));
        std::fs::write(&path, &encoded).context(WriteChunkSnafu { path: &path })?;

        emit!(ChunkWritten {
            rows: rows as u64,
            bytes: encoded.len() as u64,
        });
        info!(rows, "Wrote {}", path.display());
        report.chunks.push(ChunkFile { path, rows });
    }

    info!(
        "Split {} into {} chunk(s), {} row(s)",
        source.display(),
        report.chunks.len(),
        report.rows()
    );
    Ok(report)
}

/// Run [`chunk_csv`] off the async runtime.
pub async fn chunk_csv_blocking(config: ChunkingConfig) -> Result<ChunkReport, IngestError> {
    tokio::task::spawn_blocking(move || chunk_csv(&config))
        .await
        .context(ChunkTaskSnafu)?
}

/// Whether `path` is a shard of the CSV named `stem`.
pub fn is_chunk_of(path: &Path, stem: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(stem))
        .and_then(|rest| rest.strip_prefix("_chunk_"))
        .and_then(|rest| rest.strip_suffix(".parquet"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

// Shards from an earlier run with a smaller chunk size would otherwise be
// picked up by the shard glob.
fn remove_stale_chunks(dir: &Path, stem: &str) -> Result<(), IngestError> {
    let entries = std::fs::read_dir(dir).context(ReadDirectorySnafu { path: dir })?;
    for entry in entries {
        let path = entry.context(ReadDirectorySnafu { path: dir })?.path();
        if is_chunk_of(&path, stem) {
            debug!("Removing stale chunk {}", path.display());
            std::fs::remove_file(&path).context(WriteChunkSnafu { path: &path })?;
        }
    }
    Ok(())
}
