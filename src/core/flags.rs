/// Story flags — named facts that, once set, stay set.

use log::debug;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Set-once story flags shared between conversations.
///
/// Cloning the store yields another handle to the same flags, so the engine
/// and a save system can hold it at the same time without extra locking.
#[derive(Debug, Clone, Default)]
pub struct FlagStore {
    flags: Arc<RwLock<FxHashSet<String>>>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a saved snapshot. Entries mapped to `false` are
    /// ignored.
    pub fn from_snapshot<I>(snapshot: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let store = Self::new();
        store.restore(snapshot);
        store
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains(name)
    }

    /// Record `name` as set. Returns `true` only when the flag is new;
    /// empty names and repeated sets are no-ops.
    pub fn set(&self, name: &str) -> bool {
        if name.is_empty() || self.contains(name) {
            return false;
        }
        let inserted = self.write().insert(name.to_string());
        if inserted {
            debug!("flag set: {}", name);
        }
        inserted
    }

    /// Merge a saved snapshot into the store. Flags already set stay set.
    pub fn restore<I>(&self, snapshot: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let mut flags = self.write();
        for (name, value) in snapshot {
            if value && !name.is_empty() {
                flags.insert(name);
            }
        }
    }

    /// Every set flag mapped to `true`, in name order.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.read().iter().map(|name| (name.clone(), true)).collect()
    }

    /// Flag names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().iter().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether `other` is a handle to the same flags.
    pub fn shares_with(&self, other: &FlagStore) -> bool {
        Arc::ptr_eq(&self.flags, &other.flags)
    }

    pub fn save_to_ron(&self, path: &Path) -> Result<(), FlagError> {
        let serialized =
            ron::ser::to_string_pretty(&self.snapshot(), ron::ser::PrettyConfig::default())?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn load_from_ron(path: &Path) -> Result<FlagStore, FlagError> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: BTreeMap<String, bool> = ron::from_str(&contents)?;
        Ok(Self::from_snapshot(snapshot))
    }

    fn read(&self) -> RwLockReadGuard<'_, FxHashSet<String>> {
        self.flags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FxHashSet<String>> {
        self.flags.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Serialize for FlagStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FlagStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = BTreeMap::<String, bool>::deserialize(deserializer)?;
        Ok(Self::from_snapshot(snapshot))
    }
}
