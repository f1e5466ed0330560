//! Resolution of the bronze shards a run reads.

use object_store::path::Path;

use enem_core::{StorageError, StorageProvider};

use crate::config::InputFormat;

/// One bronze file to transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceShard {
    pub path: Path,
    /// File name without its last extension; names the silver outputs.
    pub basename: String,
}

impl SourceShard {
    pub fn new(path: Path) -> Self {
        let basename = basename(&path);
        Self { path, basename }
    }
}

/// File name of `path` without its last extension.
pub fn basename(path: &Path) -> String {
    let name = path.filename().unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Split a shard prefix into its parent "directory" and file name prefix.
fn split_prefix(source_prefix: &str) -> (&str, &str) {
    match source_prefix.rsplit_once('/') {
        Some((parent, stem)) => (parent, stem),
        None => ("", source_prefix),
    }
}

/// Whether `name` matches the glob `{stem}*.{extension}`.
fn matches_shard(name: &str, stem: &str, extension: &str) -> bool {
    let suffix_len = extension.len() + 1;
    name.len() >= stem.len() + suffix_len
        && name.starts_with(stem)
        && name
            .strip_suffix(extension)
            .is_some_and(|rest| rest.ends_with('.'))
}

/// Resolve the shards to transform.
///
/// When `partitioned`, these are the files directly under the parent of
/// `source_prefix` matching `{source_prefix}*.{format}`, sorted. Otherwise
/// the single file `{source_prefix}.{format}` is returned without checking
/// that it exists; a missing file fails when it is read.
pub async fn resolve_sources(
    storage: &StorageProvider,
    source_prefix: &str,
    format: InputFormat,
    partitioned: bool,
) -> Result<Vec<SourceShard>, StorageError> {
    let extension = format.extension();

    if !partitioned {
        let path = Path::from(format!("{source_prefix}.{extension}"));
        return Ok(vec![SourceShard::new(path)]);
    }

    let (parent, stem) = split_prefix(source_prefix);
    let mut shards: Vec<SourceShard> = storage
        .list_directory(parent)
        .await?
        .into_iter()
        .filter(|path| {
            path.filename()
                .is_some_and(|name| matches_shard(name, stem, extension))
        })
        .map(SourceShard::new)
        .collect();

    shards.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(shards)
}
