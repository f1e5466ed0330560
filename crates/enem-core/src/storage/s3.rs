//! S3 and S3-compatible stores (MinIO and friends).

use std::collections::HashMap;
use std::sync::Arc;

use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::path::Path;
use snafu::prelude::*;

use crate::error::{S3ConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider, bucket_uri};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint; implies path-style requests over plain HTTP.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) fn construct_s3(
        config: S3Config,
        options: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        // Explicit options win over the URL.
        for (key, value) in options {
            let key: AmazonS3ConfigKey = key.parse().context(S3ConfigSnafu)?;
            builder = builder.with_config(key, value);
        }

        let store = builder.build().context(S3ConfigSnafu)?;
        let canonical_url = bucket_uri("s3", &config.bucket, config.key.as_ref());

        Ok(Self {
            config: BackendConfig::S3(config),
            object_store: Arc::new(store),
            canonical_url,
        })
    }
}
