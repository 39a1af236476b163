use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use dashmap::DashMap;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed preferences file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Persistent string properties, the side channel priorities are saved to.
pub trait KeyValueStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn set_property(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Names of all properties starting with `prefix`, sorted.
    fn property_names_by_prefix(&self, prefix: &str) -> Vec<String>;
}

fn names_by_prefix(properties: &DashMap<String, String>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = properties
        .iter()
        .filter(|entry| entry.key().starts_with(prefix))
        .map(|entry| entry.key().clone())
        .collect();
    names.sort();
    names
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    properties: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.properties.get(key).map(|v| v.value().clone())
    }

    fn set_property(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.properties.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn property_names_by_prefix(&self, prefix: &str) -> Vec<String> {
        names_by_prefix(&self.properties, prefix)
    }
}

/// JSON object of string properties, loaded once and rewritten on every
/// change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    properties: DashMap<String, String>,
    // serializes rewrites of the file
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let properties: BTreeMap<String, String> = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(properties) => properties,
                Err(source) => return Err(StoreError::Parse { path, source }),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No preferences file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        debug!("Loaded {} properties from {}", properties.len(), path.display());

        Ok(Self {
            path,
            properties: properties.into_iter().collect(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let entries: BTreeMap<String, String> = self
            .properties
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let text = serde_json::to_string_pretty(&entries).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let tmp = temp_path_for(&self.path);
        let write = |p: &Path| -> std::io::Result<()> {
            let mut file = std::fs::File::create(p)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()
        };
        write(&tmp)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.properties.get(key).map(|v| v.value().clone())
    }

    fn set_property(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.properties.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn property_names_by_prefix(&self, prefix: &str) -> Vec<String> {
        names_by_prefix(&self.properties, prefix)
    }
}

/// `path` with `.tmp` appended to the full file name.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
