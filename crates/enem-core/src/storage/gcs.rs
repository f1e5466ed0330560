//! Google Cloud Storage, the production bucket.

use std::collections::HashMap;
use std::sync::Arc;

use object_store::gcp::{GoogleCloudStorageBuilder, GoogleConfigKey};
use object_store::path::Path;
use snafu::prelude::*;
use tracing::debug;

use crate::error::{GcsConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider, bucket_uri};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    /// Credentials resolve in this order: `credentials_path`, explicit
    /// `options`, then the environment (`GOOGLE_APPLICATION_CREDENTIALS`).
    pub(super) fn construct_gcs(
        config: GcsConfig,
        credentials_path: Option<&std::path::Path>,
        options: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let builder = options.iter().try_fold(
            GoogleCloudStorageBuilder::from_env().with_bucket_name(&config.bucket),
            |builder, (key, value)| {
                let key: GoogleConfigKey = key.parse().context(GcsConfigSnafu)?;
                Ok::<_, StorageError>(builder.with_config(key, value))
            },
        )?;

        let builder = match credentials_path {
            Some(path) => {
                debug!(bucket = %config.bucket, key_file = %path.display(), "Using service account key");
                builder.with_service_account_path(path.to_string_lossy())
            }
            None => builder,
        };

        let store = builder.build().context(GcsConfigSnafu)?;
        let canonical_url = bucket_uri("gs", &config.bucket, config.key.as_ref());

        Ok(Self {
            config: BackendConfig::Gcs(config),
            object_store: Arc::new(store),
            canonical_url,
        })
    }
}
