//! File-backed content store.
//!
//! Items live one-per-file at `<root>/content/<performance_id>.yaml`. All
//! mutations are staged in memory; [`ContentStore::commit`] flushes them with
//! a hash-gated atomic write:
//!
//! 1. Serialize the item without its `modified_at` stamp.
//! 2. SHA-256 the serialization.
//! 3. Compare with the hash store → `Unchanged` if identical and on disk.
//! 4. Stamp `modified_at`, write `<path>.tmp`, rename to the final path.
//! 5. Update the hash store entry, save the store once per commit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use crate::error::{store_io_err, StoreError};
use crate::hash_store;
use crate::ports::{ContentStore, ProductCatalog};
use crate::settings;
use crate::types::{ContentItem, PerformanceId, Product, PublicationState};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of committing one staged item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Item file was written (content changed or did not previously exist).
    Written { id: PerformanceId },
    /// Item was skipped: content matches the stored hash.
    Unchanged { id: PerformanceId },
    /// Item file was removed.
    Deleted { id: PerformanceId },
}

/// A content file that could not be read as an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableItem {
    pub path: PathBuf,
    pub reason: String,
}

/// Items found by a directory scan, plus the files that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ItemScan {
    pub items: Vec<ContentItem>,
    pub unreadable: Vec<UnreadableItem>,
}

#[derive(Debug, Clone)]
enum Staged {
    Upsert(Box<ContentItem>),
    Delete,
}

// ---------------------------------------------------------------------------
// FileContentStore
// ---------------------------------------------------------------------------

/// [`ContentStore`] over a directory of YAML files.
#[derive(Debug)]
pub struct FileContentStore {
    root: PathBuf,
    staged: BTreeMap<PerformanceId, Staged>,
}

impl FileContentStore {
    /// Open a store rooted at `root` (created lazily on first commit).
    pub fn open(root: impl Into<PathBuf>) -> Self {
        FileContentStore {
            root: root.into(),
            staged: BTreeMap::new(),
        }
    }

    /// Open the store under `<home>/.twtsync/`.
    pub fn open_at(home: &Path) -> Self {
        Self::open(settings::root_at(home))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/content/`
    pub fn content_dir(&self) -> PathBuf {
        self.root.join("content")
    }

    /// `<root>/content/<id>.yaml`: pure, no I/O.
    pub fn item_path(&self, id: &PerformanceId) -> Result<PathBuf, StoreError> {
        check_key(id)?;
        Ok(self.content_dir().join(format!("{}.yaml", id.0)))
    }

    /// Number of staged, uncommitted changes.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Every committed item merged with staged changes, sorted by id.
    ///
    /// Files that fail to read or parse are logged and left out.
    pub fn list_all(&self) -> Result<Vec<ContentItem>, StoreError> {
        Ok(self.scan_all()?.items)
    }

    /// Like [`list_all`](Self::list_all), but reports the skipped files.
    pub fn scan_all(&self) -> Result<ItemScan, StoreError> {
        let mut items: BTreeMap<PerformanceId, ContentItem> = BTreeMap::new();
        let mut unreadable = Vec::new();
        let dir = self.content_dir();
        if dir.exists() {
            let entries = std::fs::read_dir(&dir).map_err(|e| store_io_err(&dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| store_io_err(&dir, e))?;
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) != Some("yaml") {
                    continue;
                }
                match read_item(&path) {
                    Ok(item) => {
                        items.insert(item.performance_id.clone(), item);
                    }
                    Err(err) => {
                        log::warn!("skipping unreadable item: {err}");
                        unreadable.push(UnreadableItem {
                            path,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        for (id, staged) in &self.staged {
            match staged {
                Staged::Upsert(item) => {
                    items.insert(id.clone(), (**item).clone());
                }
                Staged::Delete => {
                    items.remove(id);
                }
            }
        }
        unreadable.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(ItemScan {
            items: items.into_values().collect(),
            unreadable,
        })
    }

    fn load_committed(&self, id: &PerformanceId) -> Result<Option<ContentItem>, StoreError> {
        let path = self.item_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        read_item(&path).map(Some)
    }

    fn write_item(
        &self,
        item: &ContentItem,
        hashes: &mut hash_store::HashStore,
    ) -> Result<WriteResult, StoreError> {
        let id = item.performance_id.clone();
        let path = self.item_path(&id)?;

        let mut unstamped = item.clone();
        unstamped.modified_at = None;
        let digest = hash_store::digest(&serde_yaml::to_string(&unstamped)?);

        if path.exists() && hashes.get(&id.0) == Some(&digest) {
            log::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged { id });
        }

        let mut stamped = unstamped;
        stamped.modified_at = Some(Utc::now());
        let yaml = serde_yaml::to_string(&stamped)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| store_io_err(parent, e))?;
        }
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| store_io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(store_io_err(&path, e));
        }

        hashes.insert(id.0.clone(), digest);
        log::info!("wrote: {}", path.display());
        Ok(WriteResult::Written { id })
    }

    fn remove_item(
        &self,
        id: &PerformanceId,
        hashes: &mut hash_store::HashStore,
    ) -> Result<WriteResult, StoreError> {
        let path = self.item_path(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(store_io_err(&path, e)),
        }
        hashes.remove(&id.0);
        log::info!("deleted: {}", path.display());
        Ok(WriteResult::Deleted { id: id.clone() })
    }
}

impl ContentStore for FileContentStore {
    fn find_by_external_id(&self, id: &PerformanceId) -> Result<Option<ContentItem>, StoreError> {
        match self.staged.get(id) {
            Some(Staged::Upsert(item)) => Ok(Some((**item).clone())),
            Some(Staged::Delete) => Ok(None),
            None => self.load_committed(id),
        }
    }

    fn find_all_in_window(&self, date_from: NaiveDate) -> Result<ItemScan, StoreError> {
        let mut scan = self.scan_all()?;
        scan.items
            .retain(|item| matches!(item.dates.start(), Some(start) if start.date() >= date_from));
        Ok(scan)
    }

    fn create(
        &mut self,
        container: &str,
        portal_type: &str,
        id: &PerformanceId,
        title: &str,
        description: &str,
    ) -> Result<ContentItem, StoreError> {
        check_key(id)?;
        if self.find_by_external_id(id)?.is_some() {
            return Err(StoreError::AlreadyExists { id: id.clone() });
        }
        let item = ContentItem::new(container, portal_type, id.clone(), title, description);
        self.staged
            .insert(id.clone(), Staged::Upsert(Box::new(item.clone())));
        log::info!("created performance {id} in '{container}'");
        Ok(item)
    }

    fn save(&mut self, item: &ContentItem) -> Result<(), StoreError> {
        check_key(&item.performance_id)?;
        self.staged.insert(
            item.performance_id.clone(),
            Staged::Upsert(Box::new(item.clone())),
        );
        Ok(())
    }

    fn transition(
        &mut self,
        item: &mut ContentItem,
        state: PublicationState,
    ) -> Result<(), StoreError> {
        let previous = item.state;
        item.state = state;
        self.save(item)?;
        log::info!(
            "performance {}: {previous} → {state}",
            item.performance_id
        );
        Ok(())
    }

    fn delete(&mut self, item: &ContentItem) -> Result<(), StoreError> {
        let id = &item.performance_id;
        if self.find_by_external_id(id)?.is_none() {
            return Err(StoreError::NotFound { id: id.clone() });
        }
        self.staged.insert(id.clone(), Staged::Delete);
        Ok(())
    }

    fn commit(&mut self) -> Result<Vec<WriteResult>, StoreError> {
        if self.staged.is_empty() {
            return Ok(Vec::new());
        }
        let staged = std::mem::take(&mut self.staged);
        let mut store = hash_store::load_at(&self.root)?;
        let mut results = Vec::with_capacity(staged.len());

        for (id, change) in staged {
            let result = match change {
                Staged::Upsert(item) => self.write_item(&item, &mut store.items)?,
                Staged::Delete => self.remove_item(&id, &mut store.items)?,
            };
            results.push(result);
        }

        if results
            .iter()
            .any(|r| !matches!(r, WriteResult::Unchanged { .. }))
        {
            store.synced_at = Some(Utc::now());
            hash_store::save_at(&self.root, &store)?;
        }
        Ok(results)
    }

    fn abort(&mut self) {
        if !self.staged.is_empty() {
            log::debug!("discarding {} staged change(s)", self.staged.len());
        }
        self.staged.clear();
    }
}

// ---------------------------------------------------------------------------
// FileProductCatalog
// ---------------------------------------------------------------------------

/// [`ProductCatalog`] reading `<root>/products/<product_id>.yaml`.
#[derive(Debug, Clone)]
pub struct FileProductCatalog {
    root: PathBuf,
}

impl FileProductCatalog {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        FileProductCatalog { root: root.into() }
    }

    pub fn open_at(home: &Path) -> Self {
        Self::open(settings::root_at(home))
    }

    pub fn product_path(&self, product_id: &str) -> PathBuf {
        self.root.join("products").join(format!("{product_id}.yaml"))
    }
}

impl ProductCatalog for FileProductCatalog {
    fn product(&self, product_id: &str) -> Option<Product> {
        if !is_safe_key(product_id) {
            return None;
        }
        let path = self.product_path(product_id);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_yaml::from_str(&contents) {
            Ok(product) => Some(product),
            Err(err) => {
                log::warn!("ignoring malformed product {}: {err}", path.display());
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_item(path: &Path) -> Result<ContentItem, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| store_io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
        && !key.chars().any(char::is_whitespace)
}

fn check_key(id: &PerformanceId) -> Result<(), StoreError> {
    if is_safe_key(&id.0) {
        Ok(())
    } else {
        Err(StoreError::InvalidId { id: id.clone() })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
