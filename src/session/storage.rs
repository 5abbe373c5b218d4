use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Error;

/// Durable key/value storage behind the [`SessionStore`](super::SessionStore).
///
/// Implementations must be cheap to call from synchronous code: the session
/// store persists inside `set_auth`/`clear_auth` before publishing the new
/// state.
pub trait Storage: Send + Sync + 'static {
    /// Read a key. `Ok(None)` means the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend cannot be read or is corrupt.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves either the old or the new map.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Use `path` as the backing file. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents; `None` when the file does not exist yet.
    fn read(&self) -> Result<Option<String>, Error> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        }
    }

    fn parse(&self, raw: &str) -> Result<HashMap<String, String>, Error> {
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(raw)
            .map_err(|e| Error::Storage(format!("{}: corrupt: {e}", self.path.display())))
    }

    fn load(&self) -> Result<HashMap<String, String>, Error> {
        match self.read()? {
            Some(raw) => self.parse(&raw),
            None => Ok(HashMap::new()),
        }
    }

    fn store(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut entries = match self.read()? {
            Some(raw) => self.parse(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Replacing corrupt session file");
                HashMap::new()
            }),
            None => HashMap::new(),
        };
        f(&mut entries);
        self.store(&entries)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
pub(crate) fn scratch_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("coursedesk-{label}-{}.json", ulid::Ulid::new()))
}
