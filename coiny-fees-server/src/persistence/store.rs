use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

/// Persistence layer errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid value for key {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Minimal key/value storage
///
/// No transactions are assumed. `set_many` writes a batch as close to
/// atomically as the backend allows.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError>;

    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> Result<(), PersistenceError>;
}

/// Stores every key as a file inside a data directory
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Creates a new file store with the specified data directory
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let data_dir = data_dir.as_ref().to_path_buf();

        // Ensure the data directory exists
        fs::create_dir_all(&data_dir)?;

        info!("Initialized file store at: {}", data_dir.display());

        Ok(Self { data_dir })
    }

    /// Maps a key such as `fees:raw` to `fees_raw.json`
    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.data_dir.join(format!("{file_name}.json"))
    }

    fn write_temp(&self, key: &str, value: &[u8]) -> Result<(PathBuf, PathBuf), PersistenceError> {
        let path = self.path_for(key);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, value)?;
        Ok((temp, path))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        let (temp, path) = self.write_temp(key, value)?;
        fs::rename(&temp, &path)?;
        debug!("Saved {} to: {}", key, path.display());
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> Result<(), PersistenceError> {
        // Write everything first so a failure leaves the previous values intact
        let staged = entries
            .iter()
            .map(|(key, value)| self.write_temp(key, value))
            .collect::<Result<Vec<_>, _>>()?;

        for (temp, path) in staged {
            fs::rename(&temp, &path)?;
        }

        debug!("Saved {} keys to: {}", entries.len(), self.data_dir.display());
        Ok(())
    }
}

/// In-process store, used for `--test-mode` and tests
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let entries = self.entries.read().map_err(|_| PersistenceError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        let mut entries = self.entries.write().map_err(|_| PersistenceError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn set_many(&self, batch: &[(&str, Vec<u8>)]) -> Result<(), PersistenceError> {
        let mut entries = self.entries.write().map_err(|_| PersistenceError::LockPoisoned)?;
        for (key, value) in batch {
            entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}

/// Wrapper enum for the configured backend
pub enum StoreBackend {
    File(FileStore),
    Memory(MemoryStore),
}

impl KeyValueStore for StoreBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match self {
            StoreBackend::File(store) => store.get(key),
            StoreBackend::Memory(store) => store.get(key),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        match self {
            StoreBackend::File(store) => store.set(key, value),
            StoreBackend::Memory(store) => store.set(key, value),
        }
    }

    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> Result<(), PersistenceError> {
        match self {
            StoreBackend::File(store) => store.set_many(entries),
            StoreBackend::Memory(store) => store.set_many(entries),
        }
    }
}
