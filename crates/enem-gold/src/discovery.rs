//! Finding the column groups to load and their silver files.

use std::collections::BTreeMap;

use object_store::path::Path;
use snafu::prelude::*;
use tracing::{debug, warn};

use enem_core::{SilverManifest, StorageProvider};

use crate::config::{DiscoveryMode, GoldConfig};
use crate::error::{DiscoveryError, ListSnafu, ReadManifestSnafu};

const PARQUET_EXTENSION: &str = "parquet";

/// One group to load and the silver files that make up its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSources {
    pub name: String,
    /// Storage URIs, sorted. May be empty.
    pub uris: Vec<String>,
}

fn is_parquet(path: &Path) -> bool {
    path.extension() == Some(PARQUET_EXTENSION)
}

/// `.parquet` objects under a prefix, split by group folder.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GroupedPaths {
    pub groups: BTreeMap<String, Vec<Path>>,
    /// Files directly under the prefix. They belong to no group.
    pub loose: Vec<Path>,
}

/// Group the `.parquet` objects in `paths` by the segment right after `prefix`.
pub fn group_paths(prefix: &str, paths: &[Path]) -> GroupedPaths {
    let prefix = Path::from(prefix);
    let depth = prefix.parts().count();
    let mut grouped = GroupedPaths::default();

    for path in paths.iter().filter(|p| is_parquet(p)) {
        if path.prefix_match(&prefix).is_none() {
            continue;
        }
        let rest: Vec<_> = path.parts().skip(depth).collect();
        match rest.as_slice() {
            [] => {}
            [_] => grouped.loose.push(path.clone()),
            [group, ..] => grouped
                .groups
                .entry(group.as_ref().to_string())
                .or_default()
                .push(path.clone()),
        }
    }

    for files in grouped.groups.values_mut() {
        files.sort();
    }
    grouped.loose.sort();
    grouped
}

/// Resolve the groups to load, sorted by name.
pub async fn resolve_groups(
    storage: &StorageProvider,
    config: &GoldConfig,
) -> Result<Vec<GroupSources>, DiscoveryError> {
    match config.discovery {
        DiscoveryMode::Discover => discover(storage, &config.source_prefix).await,
        DiscoveryMode::Manifest => from_manifest(storage, &config.source_prefix).await,
        DiscoveryMode::Declared => declared(storage, &config.source_prefix, &config.groups).await,
    }
}

async fn discover(
    storage: &StorageProvider,
    prefix: &str,
) -> Result<Vec<GroupSources>, DiscoveryError> {
    let paths = storage
        .list_with_prefix(prefix)
        .await
        .context(ListSnafu { prefix })?;
    debug!(prefix, objects = paths.len(), "Listed silver prefix");

    let grouped = group_paths(prefix, &paths);
    for path in &grouped.loose {
        warn!("No group folder for {path}; not loaded");
    }

    Ok(grouped
        .groups
        .into_iter()
        .map(|(name, files)| GroupSources {
            name,
            uris: files.iter().map(|path| storage.uri(path)).collect(),
        })
        .collect())
}

async fn from_manifest(
    storage: &StorageProvider,
    prefix: &str,
) -> Result<Vec<GroupSources>, DiscoveryError> {
    let manifest = SilverManifest::read(storage, prefix)
        .await
        .context(ReadManifestSnafu)?;

    Ok(manifest
        .groups
        .into_iter()
        .map(|(name, mut uris)| {
            uris.sort();
            GroupSources { name, uris }
        })
        .collect())
}

async fn declared(
    storage: &StorageProvider,
    prefix: &str,
    groups: &[String],
) -> Result<Vec<GroupSources>, DiscoveryError> {
    let mut names: Vec<&String> = groups.iter().collect();
    names.sort();
    names.dedup();

    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let group_prefix = format!("{}/{name}", prefix.trim_end_matches('/'));
        let uris = storage
            .list_with_prefix(&group_prefix)
            .await
            .context(ListSnafu {
                prefix: &group_prefix,
            })?
            .iter()
            .filter(|path| is_parquet(path))
            .map(|path| storage.uri(path))
            .collect();
        resolved.push(GroupSources {
            name: name.clone(),
            uris,
        });
    }
    Ok(resolved)
}
