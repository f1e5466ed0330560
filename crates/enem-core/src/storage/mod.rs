//! Object storage abstraction.
//!
//! Provides a single interface over GCS, S3 and the local filesystem. Paths
//! handed to and returned from the provider are relative to the bucket (and
//! to the key prefix, when the bucket URL carries one).

mod gcs;
mod local;
mod s3;
mod url_parser;

pub use gcs::GcsConfig;
pub use local::LocalConfig;
pub use s3::S3Config;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::{MB, StorageConfig};
use crate::emit;
use crate::error::{LocalReadSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{StorageOperation, StorageRequestCompleted};

/// Buffer size for streaming uploads; larger files switch to multipart.
const UPLOAD_BUFFER_SIZE: usize = 10 * MB;

/// Storage provider that abstracts over different cloud storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Connect to the bucket described by the storage section of the config.
    pub async fn connect(storage: &StorageConfig) -> Result<Self, StorageError> {
        Self::for_url_with_options(
            &storage.bucket_url(),
            storage.credentials_path.as_deref(),
            &storage.options,
        )
        .await
    }

    /// Create a storage provider for a bucket URL with default options.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::for_url_with_options(url, None, &HashMap::new()).await
    }

    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        credentials_path: Option<&std::path::Path>,
        options: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::Gcs(config) => Self::construct_gcs(config, credentials_path, options),
            BackendConfig::S3(config) => Self::construct_s3(config, options),
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// The bucket URL, including any key prefix.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Render a bucket-relative path as a full object URI (`gs://bucket/key`).
    pub fn uri(&self, path: &Path) -> String {
        format!("{}/{}", self.canonical_url, path)
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    fn prefix_path(&self, prefix: &str) -> Option<Path> {
        let qualified = self.qualify_path(&Path::from(prefix)).into_owned();
        (qualified.parts().count() > 0).then_some(qualified)
    }

    fn relative(&self, location: &Path) -> Path {
        let key_part_count = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();
        location.parts().skip(key_part_count).collect()
    }

    /// List every object under `prefix`, recursively.
    ///
    /// The prefix is matched segment by segment: `silver/parquet` finds
    /// `silver/parquet/notas/x.parquet` but not `silver/parquet_old/x.parquet`.
    /// A prefix with no objects yields an empty list. Results are sorted.
    pub async fn list_with_prefix(&self, prefix: &str) -> Result<Vec<Path>, StorageError> {
        let prefix = self.prefix_path(prefix);
        let start = Instant::now();
        let result: Result<Vec<ObjectMeta>, object_store::Error> =
            self.object_store.list(prefix.as_ref()).try_collect().await;
        record_request(StorageOperation::List, result.is_ok(), start);

        let metas = match result {
            Ok(metas) => metas,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(source) => return Err(StorageError::ObjectStore { source }),
        };

        let mut paths: Vec<Path> = metas.iter().map(|m| self.relative(&m.location)).collect();
        paths.sort();
        debug!(prefix = ?prefix, count = paths.len(), "Listed objects");
        Ok(paths)
    }

    /// List the objects directly inside the "directory" `prefix`.
    ///
    /// Deeper objects are not returned. Results are sorted.
    pub async fn list_directory(&self, prefix: &str) -> Result<Vec<Path>, StorageError> {
        let prefix = self.prefix_path(prefix);
        let start = Instant::now();
        let result = self.object_store.list_with_delimiter(prefix.as_ref()).await;
        record_request(StorageOperation::List, result.is_ok(), start);

        let objects = match result {
            Ok(listing) => listing.objects,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(source) => return Err(StorageError::ObjectStore { source }),
        };

        let mut paths: Vec<Path> = objects.iter().map(|m| self.relative(&m.location)).collect();
        paths.sort();
        Ok(paths)
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let start = Instant::now();
        let result = self.object_store.get(&self.qualify_path(path)).await;
        record_request(StorageOperation::Get, result.is_ok(), start);

        let bytes = result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(bytes)
    }

    /// Put a payload to a path, creating or overwriting the object.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        self.put_payload_with_opts(path, payload, PutOptions::default())
            .await
    }

    /// Put a Parquet file to a path with the correct content type.
    ///
    /// Local filesystem doesn't support attributes, so they are skipped there.
    pub async fn put_parquet(&self, path: &Path, bytes: Bytes) -> Result<(), StorageError> {
        let payload = PutPayload::from(bytes);
        if matches!(self.config, BackendConfig::Local(_)) {
            return self.put_payload(path, payload).await;
        }

        let opts = PutOptions {
            attributes: Attributes::from_iter([(
                Attribute::ContentType,
                AttributeValue::from("application/vnd.apache.parquet"),
            )]),
            ..Default::default()
        };
        self.put_payload_with_opts(path, payload, opts).await
    }

    async fn put_payload_with_opts(
        &self,
        path: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put_opts(&path, payload, opts).await;
        record_request(StorageOperation::Put, result.is_ok(), start);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Stream a local file to `dest`, creating or overwriting the object.
    ///
    /// The file goes through a buffered writer that switches to a multipart
    /// upload once the buffer fills, so it is never fully read into memory.
    /// A failed upload is aborted and nothing is committed. Returns the
    /// number of bytes uploaded.
    pub async fn upload_file(
        &self,
        local: &std::path::Path,
        dest: &Path,
    ) -> Result<u64, StorageError> {
        let mut file = tokio::fs::File::open(local)
            .await
            .context(LocalReadSnafu { path: local })?;

        let qualified = self.qualify_path(dest).into_owned();
        let mut writer =
            BufWriter::with_capacity(self.object_store.clone(), qualified, UPLOAD_BUFFER_SIZE);

        let start = Instant::now();
        let result = async {
            let bytes = tokio::io::copy(&mut file, &mut writer).await?;
            writer.shutdown().await?;
            Ok::<_, std::io::Error>(bytes)
        }
        .await;
        record_request(StorageOperation::Upload, result.is_ok(), start);

        match result {
            Ok(bytes) => Ok(bytes),
            Err(source) => {
                if let Err(e) = writer.abort().await {
                    warn!(path = %dest, error = %e, "Failed to abort upload");
                }
                Err(StorageError::Upload {
                    path: dest.to_string(),
                    source,
                })
            }
        }
    }
}

/// `{scheme}://{bucket}`, followed by `/{key}` when a key prefix is set.
pub(crate) fn bucket_uri(scheme: &str, bucket: &str, key: Option<&Path>) -> String {
    match key {
        Some(key) if key.parts().count() > 0 => format!("{scheme}://{bucket}/{key}"),
        _ => format!("{scheme}://{bucket}"),
    }
}

fn record_request(operation: StorageOperation, ok: bool, start: Instant) {
    emit!(StorageRequestCompleted {
        operation,
        ok,
        duration: start.elapsed(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn local_bucket() -> (tempfile::TempDir, StorageProvider) {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageProvider::for_url(dir.path().to_str().unwrap())
            .await
            .unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, storage) = local_bucket().await;
        let path = Path::from("bronze/csv/MICRODADOS_ENEM_2023.csv");

        storage
            .put_payload(&path, PutPayload::from_static(b"NU_INSCRICAO;NU_ANO\n1;2023\n"))
            .await
            .unwrap();

        let bytes = storage.get(&path).await.unwrap();
        assert_eq!(&bytes[..], b"NU_INSCRICAO;NU_ANO\n1;2023\n");
    }

    #[tokio::test]
    async fn test_list_with_prefix_is_recursive_and_sorted() {
        let (_dir, storage) = local_bucket().await;
        for key in [
            "silver/parquet/notas/b.parquet",
            "silver/parquet/escola/a.parquet",
            "silver/parquet_old/x.parquet",
        ] {
            storage
                .put_payload(&Path::from(key), PutPayload::from_static(b"x"))
                .await
                .unwrap();
        }

        let paths = storage.list_with_prefix("silver/parquet").await.unwrap();
        let paths: Vec<String> = paths.iter().map(ToString::to_string).collect();

        assert_eq!(
            paths,
            vec![
                "silver/parquet/escola/a.parquet",
                "silver/parquet/notas/b.parquet",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_prefix_lists_empty() {
        let (_dir, storage) = local_bucket().await;
        assert!(storage.list_with_prefix("nothing/here").await.unwrap().is_empty());
        assert!(storage.list_directory("nothing/here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_directory_skips_nested() {
        let (_dir, storage) = local_bucket().await;
        for key in ["bronze/parquet/a.parquet", "bronze/parquet/deeper/b.parquet"] {
            storage
                .put_payload(&Path::from(key), PutPayload::from_static(b"x"))
                .await
                .unwrap();
        }

        let paths = storage.list_directory("bronze/parquet").await.unwrap();
        assert_eq!(paths, vec![Path::from("bronze/parquet/a.parquet")]);
    }

    #[tokio::test]
    async fn test_upload_file_streams_bytes() {
        let (_dir, storage) = local_bucket().await;
        let source = tempfile::NamedTempFile::new().unwrap();
        let content = "NU_INSCRICAO;TP_SEXO\n".repeat(1000);
        std::fs::write(source.path(), &content).unwrap();

        let dest = Path::from("bronze/csv/input.csv");
        let bytes = storage.upload_file(source.path(), &dest).await.unwrap();

        assert_eq!(bytes, content.len() as u64);
        assert_eq!(storage.get(&dest).await.unwrap(), content.as_bytes());
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let (_dir, storage) = local_bucket().await;
        let err = storage
            .upload_file(std::path::Path::new("/definitely/not/here.csv"), &Path::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::LocalRead { .. }));
    }

    #[test]
    fn test_bucket_uri() {
        assert_eq!(bucket_uri("gs", "enem-lake", None), "gs://enem-lake");
        assert_eq!(
            bucket_uri("s3", "enem-lake", Some(&Path::from("2023/run"))),
            "s3://enem-lake/2023/run"
        );
        assert_eq!(
            bucket_uri("gs", "enem-lake", Some(&Path::default())),
            "gs://enem-lake"
        );
    }

    #[tokio::test]
    async fn test_uri_rendering() {
        let (dir, storage) = local_bucket().await;
        let uri = storage.uri(&Path::from("silver/parquet/notas/a.parquet"));
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            uri,
            format!("file://{}/silver/parquet/notas/a.parquet", root.display())
        );
    }
}
