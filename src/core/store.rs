//! Installed-addon store.
//!
//! Readers take an `Arc` snapshot of the installed set and keep it for the
//! whole call; writers swap in a new `Arc`. An install landing in the middle
//! of an aggregation therefore never changes what that aggregation sees.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::addon::{Addon, AddonError, AddonResult, CapabilityIndex};

/// Key-value persistence for the installed set.
pub trait AddonStorage: Send + Sync {
    /// Load the stored set, or `None` when nothing was saved yet.
    fn load(&self) -> AddonResult<Option<Vec<Addon>>>;

    /// Replace the stored set.
    fn save(&self, addons: &[Addon]) -> AddonResult<()>;
}

/// Stores the set as one JSON file named after the namespace.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
    namespace: String,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self { dir: dir.into(), namespace: namespace.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.namespace))
    }

    fn persistence_error(path: &Path, err: impl std::fmt::Display) -> AddonError {
        AddonError::Persistence(format!("{}: {err}", path.display()))
    }
}

impl AddonStorage for JsonFileStorage {
    fn load(&self) -> AddonResult<Option<Vec<Addon>>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(&path).map_err(|e| Self::persistence_error(&path, e))?;
        let addons = serde_json::from_str(&content).map_err(|e| Self::persistence_error(&path, e))?;
        Ok(Some(addons))
    }

    fn save(&self, addons: &[Addon]) -> AddonResult<()> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::persistence_error(&self.dir, e))?;

        let content =
            serde_json::to_string_pretty(addons).map_err(|e| Self::persistence_error(&path, e))?;

        // Write then rename so a crash never leaves a truncated file behind.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| Self::persistence_error(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::persistence_error(&path, e))?;

        Ok(())
    }
}

/// In-memory storage that never touches disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    saved: Mutex<Option<Vec<Addon>>>,
    fail_saves: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already-saved set.
    pub fn with_addons(addons: Vec<Addon>) -> Self {
        Self { saved: Mutex::new(Some(addons)), fail_saves: AtomicBool::new(false) }
    }

    /// Make every following save fail until switched back.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The last successfully saved set.
    pub fn saved(&self) -> Option<Vec<Addon>> {
        self.saved.lock().clone()
    }
}

impl AddonStorage for MemoryStorage {
    fn load(&self) -> AddonResult<Option<Vec<Addon>>> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, addons: &[Addon]) -> AddonResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AddonError::Persistence("storage unavailable".to_string()));
        }
        *self.saved.lock() = Some(addons.to_vec());
        Ok(())
    }
}

/// Holds the installed set and writes it through to storage.
pub struct AddonStore {
    current: RwLock<Arc<Vec<Addon>>>,
    storage: Arc<dyn AddonStorage>,
    persist_pending: AtomicBool,
}

impl AddonStore {
    pub fn new(storage: Arc<dyn AddonStorage>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Vec::new())),
            storage,
            persist_pending: AtomicBool::new(false),
        }
    }

    /// A store backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Current installed set, in installation order.
    pub fn snapshot(&self) -> Arc<Vec<Addon>> {
        Arc::clone(&*self.current.read())
    }

    /// Capability index over the current snapshot.
    pub fn index(&self) -> CapabilityIndex {
        CapabilityIndex::new(self.snapshot())
    }

    /// Read the persisted set into memory.
    ///
    /// Returns the number of addons loaded. Nothing saved yet loads as an
    /// empty set; a read error leaves the in-memory set untouched.
    pub fn load(&self) -> AddonResult<usize> {
        let addons = self.storage.load()?.unwrap_or_default();
        let count = addons.len();
        *self.current.write() = Arc::new(addons);
        tracing::debug!(count, "Loaded installed addons");
        Ok(count)
    }

    /// Swap in a new set and persist it.
    ///
    /// Persistence failures are logged and remembered; the in-memory set is
    /// updated regardless.
    pub(crate) fn replace(&self, addons: Vec<Addon>) -> Arc<Vec<Addon>> {
        let next = Arc::new(addons);
        *self.current.write() = Arc::clone(&next);
        self.persist_snapshot(&next);
        next
    }

    /// Derive a new set from the current one.
    ///
    /// `f` returns `None` to leave everything untouched.
    pub(crate) fn update<F, R>(&self, f: F) -> Option<(Arc<Vec<Addon>>, R)>
    where
        F: FnOnce(&[Addon]) -> Option<(Vec<Addon>, R)>,
    {
        let next = {
            let mut current = self.current.write();
            let (addons, result) = f(&current)?;
            let next = Arc::new(addons);
            *current = Arc::clone(&next);
            (next, result)
        };
        self.persist_snapshot(&next.0);
        Some(next)
    }

    /// Retry persisting the current set.
    pub fn persist(&self) -> AddonResult<()> {
        let snapshot = self.snapshot();
        self.storage.save(&snapshot)?;
        self.persist_pending.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether the last save failed.
    pub fn is_persist_pending(&self) -> bool {
        self.persist_pending.load(Ordering::SeqCst)
    }

    fn persist_snapshot(&self, addons: &[Addon]) {
        match self.storage.save(addons) {
            Ok(()) => self.persist_pending.store(false, Ordering::SeqCst),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist installed addons");
                self.persist_pending.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl std::fmt::Debug for AddonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonStore")
            .field("installed", &self.current.read().len())
            .field("persist_pending", &self.is_persist_pending())
            .finish_non_exhaustive()
    }
}
