//! Directory-backed bucket for development runs and tests.

use std::sync::Arc;

use object_store::local::LocalFileSystem;
use object_store::path::Path;
use snafu::prelude::*;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Root directory standing in for the bucket.
    pub path: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    /// The root is created if missing and resolved to an absolute path, so
    /// rendered `file://` URIs stay valid from any working directory.
    pub(super) async fn construct_local(mut config: LocalConfig) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .context(IoSnafu)?;
        let root = tokio::fs::canonicalize(&config.path)
            .await
            .context(IoSnafu)?;
        config.path = root.to_string_lossy().into_owned();

        let store = LocalFileSystem::new_with_prefix(&root).context(ObjectStoreSnafu)?;
        let canonical_url = format!("file://{}", config.path.trim_end_matches('/'));

        Ok(Self {
            config: BackendConfig::Local(config),
            object_store: Arc::new(store),
            canonical_url,
        })
    }
}
