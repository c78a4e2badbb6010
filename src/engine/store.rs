//! Key-value store access.
//!
//! The platform configuration store (shared preferences, user defaults, a
//! plain JSON file) is only ever touched through the narrow [`KvStore`]
//! contract defined here. The engine reads rules and the dedup record through
//! it and writes the dedup record and the pending-invalid flag back; nothing
//! else crosses this boundary.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: mutex-guarded in-process map. Used by tests and by the
//!   CLI when no store file is given.
//! - [`JsonFileStore`]: a single JSON object persisted to disk on every
//!   write. The CLI's stand-in for the platform preference store.
//!
//! Both hand out read-after-write consistency within one process, which is
//! what the duplicate suppressor's check-then-record sequence relies on.
//! Values are stored as loose JSON values; a value of the wrong type reads
//! back as absent rather than failing, matching how the platform stores
//! behave.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

/// Failures crossing the store boundary.
///
/// Callers above the accessor layer never see these: rule loading falls back
/// to an empty list, dedup checks fail open, writes are logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed store payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// The contract the persisted-configuration collaborator is specified at.
///
/// Implementations take `&self`; interior locking is their responsibility so
/// a store can be shared across delivery channels behind an `Arc`.
pub trait KvStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError>;
    fn put_i64(&self, key: &str, value: i64) -> Result<(), StoreError>;

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError>;
    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// --- In-memory implementation ------------------------------------------------

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(key)?.and_then(|v| v.as_str().map(str::to_string)))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, Value::from(value))
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.read(key)?.and_then(|v| v.as_i64()))
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.write(key, Value::from(value))
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.read(key)?.and_then(|v| v.as_bool()))
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.write(key, Value::from(value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

// --- JSON-file implementation -------------------------------------------------

/// Store backed by a single JSON object on disk.
///
/// The whole object is loaded on open and rewritten on every mutation, which
/// is plenty for a store holding a handful of keys. A missing file opens as
/// an empty store; it is created on the first write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => HashMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(JsonFileStore { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    /// Update one key and persist the whole object while still holding the
    /// lock, so concurrent writers cannot interleave a stale snapshot.
    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value);
        Self::persist(&self.path, &values)
    }

    fn persist(path: &Path, values: &HashMap<String, Value>) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(values)?;
        fs::write(path, text)?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(key)?.and_then(|v| v.as_str().map(str::to_string)))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, Value::from(value))
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.read(key)?.and_then(|v| v.as_i64()))
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.write(key, Value::from(value))
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.read(key)?.and_then(|v| v.as_bool()))
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.write(key, Value::from(value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(key);
        Self::persist(&self.path, &values)
    }
}
