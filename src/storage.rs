use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::StorageError;

const PROBE_KEY: &str = "__storage_test__";

/// String key-value storage, the medium the repository mirrors state into.
pub trait KeyValueStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per entry under `root`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        source,
    }
}

impl KeyValueStore for FileStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(key, err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|err| io_error(key, err))?;
        std::fs::write(self.path_for(key), value).map_err(|err| io_error(key, err))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(key, err)),
        }
    }
}

/// Wraps a primary store and serves from memory whenever the primary is
/// unusable. Availability is probed once, on first access.
#[derive(Debug)]
pub struct SafeStore<S> {
    primary: S,
    available: Option<bool>,
    fallback: MemoryStore,
}

impl<S: KeyValueStore> SafeStore<S> {
    pub fn new(primary: S) -> Self {
        Self {
            primary,
            available: None,
            fallback: MemoryStore::new(),
        }
    }

    pub fn is_available(&mut self) -> bool {
        if let Some(available) = self.available {
            return available;
        }

        let probe = self
            .primary
            .set(PROBE_KEY, PROBE_KEY)
            .and_then(|_| self.primary.remove(PROBE_KEY));
        let available = match probe {
            Ok(()) => true,
            Err(err) => {
                warn!("persistent storage unavailable, keeping state in memory: {err}");
                false
            }
        };
        self.available = Some(available);
        available
    }
}

impl<S: KeyValueStore> KeyValueStore for SafeStore<S> {
    fn get(&mut self, key: &str) -> Result<Option<String>, StorageError> {
        if self.is_available() {
            match self.primary.get(key) {
                Ok(value) => return Ok(value),
                Err(err) => debug!("read of {key} fell back to memory: {err}"),
            }
        }
        self.fallback.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.is_available() {
            match self.primary.set(key, value) {
                Ok(()) => return Ok(()),
                Err(err) => warn!("write of {key} fell back to memory: {err}"),
            }
        }
        self.fallback.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.is_available() {
            match self.primary.remove(key) {
                Ok(()) => return Ok(()),
                Err(err) => warn!("removal of {key} fell back to memory: {err}"),
            }
        }
        self.fallback.remove(key)
    }
}
