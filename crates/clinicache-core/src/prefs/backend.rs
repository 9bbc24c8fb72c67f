use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use super::error::{PrefsError, Result};
use crate::utils::write_atomic;

/// String key-value storage.
pub trait KeyValueBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Durable storage: one JSON object file.
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(items)?;
        write_atomic(&self.path, contents.as_bytes())?;
        Ok(())
    }
}

impl KeyValueBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| PrefsError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| PrefsError::Poisoned)?;
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| PrefsError::Poisoned)?;
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }
}

/// Session-scoped storage: gone when the process exits.
#[derive(Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total stored bytes past `quota`.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota: Some(quota),
        }
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(|_| PrefsError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| PrefsError::Poisoned)?;
        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(PrefsError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| PrefsError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_round_trip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("preferences.json");

        let backend = FileBackend::new(path.clone());
        assert_eq!(backend.get_item("theme").unwrap(), None);
        backend.set_item("theme", "dark").unwrap();
        backend.set_item("language", "en").unwrap();
        backend.remove_item("language").unwrap();

        let reopened = FileBackend::new(path);
        assert_eq!(reopened.get_item("theme").unwrap(), Some("dark".to_string()));
        assert_eq!(reopened.get_item("language").unwrap(), None);
    }

    #[test]
    fn test_file_backend_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let backend = FileBackend::new(path);
        assert!(matches!(backend.get_item("theme"), Err(PrefsError::Json(_))));
    }

    #[test]
    fn test_memory_backend_quota() {
        let backend = MemoryBackend::with_quota(10);
        backend.set_item("k", "12345").unwrap();
        // Overwriting the same key only counts the new value
        backend.set_item("k", "123456789").unwrap();

        let err = backend.set_item("other", "x").unwrap_err();
        assert!(matches!(err, PrefsError::QuotaExceeded { quota: 10, .. }));
        assert_eq!(backend.get_item("other").unwrap(), None);
    }
}
