//! Multi-file configuration loading.
//!
//! Every file is interpolated and parsed to a YAML value, then merged over
//! the documents loaded before it. The merged document is deserialized once,
//! so each stage picks the sections it needs from the same files.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::config::{ConfigPath, interpolate, is_yaml_file};
use crate::error::ConfigError;

/// Load, merge and deserialize configuration from files and directories.
///
/// Errors from every source are collected before failing.
pub fn load_from_paths<C: DeserializeOwned>(paths: &[ConfigPath]) -> Result<C, ConfigError> {
    if paths.is_empty() {
        return Err(ConfigError::NoConfigPaths);
    }

    let mut merged = Value::Mapping(Default::default());
    let mut errors = Vec::new();

    for path in paths {
        let loaded = match path {
            ConfigPath::File(file_path) => load_file(file_path).map(|doc| vec![doc]),
            ConfigPath::Dir(dir_path) => load_dir(dir_path),
        };
        match loaded {
            Ok(documents) => documents
                .into_iter()
                .for_each(|doc| merge_values(&mut merged, doc)),
            Err(e) => {
                let source = match path {
                    ConfigPath::File(p) | ConfigPath::Dir(p) => p.display(),
                };
                errors.push(format!("{source}: {e}"));
            }
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }

    serde_yaml::from_value(merged).map_err(|source| ConfigError::YamlParse { source })
}

/// Merge `overlay` into `base`.
///
/// Mappings merge key by key; any other value in `overlay`, including an
/// explicit `~`, replaces the one in `base`. An empty document leaves
/// `base` untouched.
pub fn merge_values(base: &mut Value, overlay: Value) {
    if !overlay.is_null() {
        merge_into(base, overlay);
    }
}

fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn load_file(path: &Path) -> Result<Value, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;
    let text = interpolate(&contents)?;

    serde_yaml::from_str(&text).map_err(|source| ConfigError::YamlParse { source })
}

fn load_dir(dir: &Path) -> Result<Vec<Value>, ConfigError> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| ConfigError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_yaml_file(path))
        .collect();

    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    for path in files {
        match load_file(&path) {
            Ok(doc) => documents.push(doc),
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(documents)
}
