// JSON file key-value store
use crate::application::preferences_repository::{KeyValueStore, StorageError};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// All keys live in one JSON object. Values are stored as strings, the way
/// browser local storage holds them.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write to a sibling temp file, then rename over the original.
    fn write_all(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let values = self.read_all()?;
        Ok(values.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // a corrupt file is replaced rather than blocking every later write;
        // an I/O failure aborts so the other keys are not lost
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!("Discarding corrupt preferences file {}: {}", self.path.display(), e);
                Map::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.get("cardsLayout").unwrap(), None);
    }

    #[test]
    fn test_set_then_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = JsonFileStore::new(&path);
        store.set("stopwatchRunning", "true").unwrap();
        store.set("cardsLayout", "[]").unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("stopwatchRunning").unwrap().as_deref(), Some("true"));
        assert_eq!(reopened.get("cardsLayout").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_corrupt_file_errors_on_read_and_is_replaced_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{{{").unwrap();
        let store = JsonFileStore::new(&path);

        assert!(matches!(store.get("x"), Err(StorageError::Corrupt(_))));
        store.set("x", "1").unwrap();
        assert_eq!(store.get("x").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_read_failure_aborts_write() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be cannot be read as a file
        let path = dir.path().join("prefs.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();
        let store = JsonFileStore::new(&path);

        assert!(matches!(store.get("x"), Err(StorageError::Io(_))));
        assert!(matches!(store.set("x", "1"), Err(StorageError::Io(_))));
        assert!(path.join("keep").exists());
    }
}
