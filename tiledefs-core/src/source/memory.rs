//! In-memory definition source

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use crate::definition::{Definition, DefinitionMap};
use crate::error::{DefsError, Result};
use crate::key::CustomizationKey;

use super::DefinitionSource;

/// Definitions of one key and the revision of their last change
#[derive(Debug, Default)]
struct KeyEntry {
    definitions: DefinitionMap,
    revision: u64,
}

/// Definitions held in memory, per key
///
/// Every mutation stamps the key it touched with a fresh revision. The
/// source reports a change while any key it loaded has been stamped since.
#[derive(Debug)]
pub struct InMemorySource<K: CustomizationKey> {
    id: String,
    entries: RwLock<HashMap<K, KeyEntry>>,
    next_revision: AtomicU64,
    /// Revision of each key at its last load
    loaded: Mutex<HashMap<K, u64>>,
}

impl<K: CustomizationKey> InMemorySource<K> {
    /// Create an empty source
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: RwLock::new(HashMap::new()),
            next_revision: AtomicU64::new(1),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Add or replace one definition for `key`
    ///
    /// Unnamed definitions are ignored; a source can only contribute named ones.
    pub fn insert(&self, key: K, definition: Definition) {
        let Some(name) = definition.name.clone() else {
            return;
        };
        self.modify(key, |definitions| {
            definitions.insert(name, definition);
        });
    }

    /// Replace every definition for `key`
    pub fn set(&self, key: K, definitions: impl IntoIterator<Item = Definition>) {
        let map: DefinitionMap = definitions
            .into_iter()
            .filter_map(|d| d.name.clone().map(|name| (name, d)))
            .collect();
        self.modify(key, |definitions| *definitions = map);
    }

    /// Drop every definition for `key`
    pub fn remove_key(&self, key: &K) {
        self.modify(key.clone(), DefinitionMap::clear);
    }

    /// Total definitions across all keys
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().map(|entry| entry.definitions.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn modify(&self, key: K, change: impl FnOnce(&mut DefinitionMap)) {
        if let Ok(mut entries) = self.entries.write() {
            let entry = entries.entry(key).or_default();
            change(&mut entry.definitions);
            entry.revision = self.next_revision.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl<K: CustomizationKey> DefinitionSource<K> for InMemorySource<K> {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self, key: &K) -> Result<DefinitionMap> {
        let entries = self.entries.read().map_err(|_| DefsError::LockPoisoned)?;
        let (definitions, revision) = match entries.get(key) {
            Some(entry) => (entry.definitions.clone(), entry.revision),
            None => (DefinitionMap::new(), 0),
        };
        self.loaded
            .lock()
            .map_err(|_| DefsError::LockPoisoned)?
            .insert(key.clone(), revision);
        Ok(definitions)
    }

    fn has_changed(&self) -> bool {
        let (Ok(entries), Ok(loaded)) = (self.entries.read(), self.loaded.lock()) else {
            return false;
        };
        loaded.iter().any(|(key, seen)| {
            entries.get(key).map(|entry| entry.revision).unwrap_or(0) != *seen
        })
    }

    fn forget_loaded(&self) {
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Locale;

    #[test]
    fn test_load_per_key() {
        let source = InMemorySource::new("test");
        source.insert(Locale::root(), Definition::new("a"));
        source.insert("en".parse().unwrap(), Definition::new("b"));

        let root = source.load(&Locale::root()).unwrap();
        assert!(root.contains_key("a"));
        assert!(!root.contains_key("b"));

        let missing = source.load(&"de".parse().unwrap()).unwrap();
        assert!(missing.is_empty());
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_change_tracking() {
        let source = InMemorySource::new("test");
        source.insert(Locale::root(), Definition::new("a"));
        source.load(&Locale::root()).unwrap();
        assert!(!source.has_changed());

        source.set(Locale::root(), vec![Definition::new("a").with_template("/new.jsp")]);
        assert!(source.has_changed());

        source.load(&Locale::root()).unwrap();
        assert!(!source.has_changed());
    }

    #[test]
    fn test_loading_another_key_keeps_pending_change() {
        let source = InMemorySource::new("test");
        source.insert(Locale::root(), Definition::new("a"));
        source.load(&Locale::root()).unwrap();

        source.insert(Locale::root(), Definition::new("a").with_template("/new.jsp"));
        source.load(&"de".parse().unwrap()).unwrap();
        assert!(source.has_changed());
    }

    #[test]
    fn test_changes_to_unloaded_keys_are_ignored() {
        let source: InMemorySource<Locale> = InMemorySource::new("test");
        source.load(&Locale::root()).unwrap();

        source.insert("fr".parse().unwrap(), Definition::new("a"));
        assert!(!source.has_changed());

        source.insert(Locale::root(), Definition::new("a"));
        assert!(source.has_changed());
    }

    #[test]
    fn test_removed_key_counts_as_change() {
        let source = InMemorySource::new("test");
        source.insert(Locale::root(), Definition::new("a"));
        source.load(&Locale::root()).unwrap();

        source.remove_key(&Locale::root());
        assert!(source.has_changed());
        assert!(source.load(&Locale::root()).unwrap().is_empty());
    }

    #[test]
    fn test_forget_loaded_clears_pending_changes() {
        let source: InMemorySource<Locale> = InMemorySource::new("test");
        source.load(&Locale::root()).unwrap();
        source.insert(Locale::root(), Definition::new("a"));
        assert!(source.has_changed());

        source.forget_loaded();
        assert!(!source.has_changed());
    }

    #[test]
    fn test_unnamed_definitions_are_skipped() {
        let source: InMemorySource<()> = InMemorySource::new("test");
        source.insert((), Definition::anonymous());
        assert!(source.is_empty());
    }
}
