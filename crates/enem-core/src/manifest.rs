//! Silver manifest: which files the transformation wrote for each group.
//!
//! The load stage can read this instead of inferring groups from folder
//! names. It lives at `{destination_prefix}/_manifest.json`.

use bytes::Bytes;
use object_store::PutPayload;
use object_store::path::Path;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;

use crate::error::{
    ManifestDecodeSnafu, ManifestEncodeSnafu, ManifestError, ManifestStorageSnafu,
};
use crate::storage::StorageProvider;

pub const MANIFEST_FILE_NAME: &str = "_manifest.json";

/// Map from group name to the storage URIs written for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilverManifest {
    pub groups: BTreeMap<String, Vec<String>>,
}

impl SilverManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a written file under `group`. Duplicates are ignored.
    pub fn add(&mut self, group: &str, uri: String) {
        let uris = self.groups.entry(group.to_string()).or_default();
        if !uris.contains(&uri) {
            uris.push(uri);
        }
    }

    /// Group names in sorted order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn uris(&self, group: &str) -> &[String] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Location of the manifest under a silver prefix.
    pub fn location(prefix: &str) -> Path {
        Path::from(format!("{}/{MANIFEST_FILE_NAME}", prefix.trim_end_matches('/')))
    }

    /// Write the manifest under `prefix`, replacing any previous one.
    ///
    /// URI lists are sorted first so the file is stable across runs.
    pub async fn write(
        &self,
        storage: &StorageProvider,
        prefix: &str,
    ) -> Result<Path, ManifestError> {
        let mut sorted = self.clone();
        sorted.groups.values_mut().for_each(|uris| uris.sort());

        let json = serde_json::to_vec_pretty(&sorted).context(ManifestEncodeSnafu)?;
        let location = Self::location(prefix);
        storage
            .put_payload(&location, PutPayload::from(Bytes::from(json)))
            .await
            .context(ManifestStorageSnafu)?;
        Ok(location)
    }

    /// Read the manifest stored under `prefix`.
    pub async fn read(storage: &StorageProvider, prefix: &str) -> Result<Self, ManifestError> {
        let location = Self::location(prefix);
        let bytes = storage
            .get(&location)
            .await
            .context(ManifestStorageSnafu)?;
        serde_json::from_slice(&bytes).context(ManifestDecodeSnafu {
            path: location.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates() {
        let mut manifest = SilverManifest::new();
        manifest.add("notas", "gs://b/silver/notas/a_notas.parquet".to_string());
        manifest.add("notas", "gs://b/silver/notas/a_notas.parquet".to_string());
        manifest.add("escola", "gs://b/silver/escola/a_escola.parquet".to_string());

        assert_eq!(manifest.group_names().collect::<Vec<_>>(), vec!["escola", "notas"]);
        assert_eq!(manifest.uris("notas").len(), 1);
        assert!(manifest.uris("presenca").is_empty());
    }

    #[test]
    fn test_location() {
        assert_eq!(
            SilverManifest::location("silver/parquet/").as_ref(),
            "silver/parquet/_manifest.json"
        );
    }

    #[tokio::test]
    async fn test_roundtrip_through_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageProvider::for_url(dir.path().to_str().unwrap())
            .await
            .unwrap();

        let mut manifest = SilverManifest::new();
        manifest.add("notas", "file:///lake/silver/notas/b_notas.parquet".to_string());
        manifest.add("notas", "file:///lake/silver/notas/a_notas.parquet".to_string());

        let location = manifest.write(&storage, "silver/parquet").await.unwrap();
        assert_eq!(location.as_ref(), "silver/parquet/_manifest.json");

        let read = SilverManifest::read(&storage, "silver/parquet").await.unwrap();
        assert_eq!(
            read.uris("notas"),
            [
                "file:///lake/silver/notas/a_notas.parquet".to_string(),
                "file:///lake/silver/notas/b_notas.parquet".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageProvider::for_url(dir.path().to_str().unwrap())
            .await
            .unwrap();

        let err = SilverManifest::read(&storage, "silver/parquet").await.unwrap_err();
        assert!(matches!(
            err,
            ManifestError::ManifestStorage { ref source } if source.is_not_found()
        ));
    }
}
