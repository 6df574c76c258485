//! Key-value persistence for session settings.
//!
//! This module defines the `KeyValueStore` trait plus two implementations:
//! `JsonFileStore`, which keeps one JSON file per key under a data directory,
//! and `MemoryStore`, used by tests and when no data directory is usable.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store key holding the last selected city.
pub const CITY_KEY: &str = "city";

/// City used when nothing has been stored yet.
pub const DEFAULT_CITY: &str = "New York";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    /// Keys become file names, so only a safe subset is accepted.
    #[error("Invalid store key: {0}")]
    InvalidKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Object-safe key-value store over JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` if the key has never been written.
    fn load_value(&self, key: &str) -> StoreResult<Option<Value>>;

    fn save_value(&self, key: &str, value: Value) -> StoreResult<()>;
}

/// Typed helpers layered over any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.load_value(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Load a value, falling back to `default` when missing or unreadable.
    fn load_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored value for '{}': {}", key, e);
                default
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.save_value(key, serde_json::to_value(value)?)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

fn validate_key(key: &str) -> StoreResult<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// File-backed store: `<dir>/<key>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!("Opened settings store at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load_value(&self, key: &str) -> StoreResult<Option<Value>> {
        let path = self.path_for(key)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save_value(&self, key: &str, value: Value) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let json = serde_json::to_string_pretty(&value)?;

        // Write beside the target then rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!("Stored '{}' at {:?}", key, path);
        Ok(())
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load_value(&self, key: &str) -> StoreResult<Option<Value>> {
        validate_key(key)?;
        Ok(self.values.lock().get(key).cloned())
    }

    fn save_value(&self, key: &str, value: Value) -> StoreResult<()> {
        validate_key(key)?;
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}
