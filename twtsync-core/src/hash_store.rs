//! Hash store: SHA-256-based idempotency tracking for committed content items.
//!
//! Persists a [`HashStoreFile`] JSON document at `<root>/hashes.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the settings file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{store_io_err, StoreError};

/// Performance id → SHA-256 hex digest of its last committed YAML.
pub type HashStore = HashMap<String, String>;

/// On-disk hash store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashStoreFile {
    /// Time of the last commit that wrote or deleted anything.
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: HashStore,
}

/// `<root>/hashes.json`
pub fn store_path_at(root: &Path) -> PathBuf {
    root.join("hashes.json")
}

/// Load the hash store. Returns an empty store if the file does not yet exist.
pub fn load_at(root: &Path) -> Result<HashStoreFile, StoreError> {
    let path = store_path_at(root);
    if !path.exists() {
        return Ok(HashStoreFile {
            synced_at: None,
            items: HashMap::new(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| store_io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the hash store atomically (`<path>.tmp` then rename).
pub fn save_at(root: &Path, store: &HashStoreFile) -> Result<(), StoreError> {
    std::fs::create_dir_all(root).map_err(|e| store_io_err(root, e))?;
    let path = store_path_at(root);
    let json = serde_json::to_string_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| store_io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| store_io_err(&path, e))?;
    Ok(())
}

/// SHA-256 hex digest of `content`.
pub fn digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = load_at(tmp.path()).unwrap();
        assert!(store.items.is_empty());
        assert!(store.synced_at.is_none());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut items = HashMap::new();
        items.insert("1409".to_string(), digest("a"));
        let store = HashStoreFile {
            synced_at: Some(Utc::now()),
            items,
        };

        save_at(tmp.path(), &store).unwrap();
        let loaded = load_at(tmp.path()).unwrap();
        assert_eq!(loaded, store);
        assert!(!store_path_at(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn digest_is_stable_hex() {
        assert_eq!(digest("x"), digest("x"));
        assert_ne!(digest("x"), digest("y"));
        assert_eq!(digest("x").len(), 64);
    }
}
