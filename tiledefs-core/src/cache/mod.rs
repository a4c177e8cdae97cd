//! Resolution cache
//!
//! The entry point for lookups. A lookup for `(name, key)`:
//!
//! 1. asks the store for the key's definitions (loading the fallback chain
//!    on first use, re-checking sources when refresh is enabled)
//! 2. returns the cached resolved definition if there is one
//! 3. otherwise resolves the raw definition of that name against its parent
//!    chain, or synthesizes one from the key's patterns, caches and returns it
//!
//! Resolved definitions are shared as `Arc<Definition>` and never mutated
//! after insertion. Inserts are serialized per key; keys never block each
//! other beyond a brief map lookup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::config::{EngineConfig, PatternConfig};
use crate::definition::Definition;
use crate::error::{DefsError, Result};
use crate::inheritance::InheritanceResolver;
use crate::key::{CustomizationKey, Locale};
use crate::source::{DefinitionSource, JsonFileSource};
use crate::store::{DefinitionStore, KeyedDefinitions};

/// Resolved definitions of one loaded key
#[derive(Debug)]
struct ResolvedKey {
    /// The store snapshot these were resolved from
    source: Arc<KeyedDefinitions>,
    definitions: RwLock<HashMap<String, Arc<Definition>>>,
}

impl ResolvedKey {
    fn new(source: Arc<KeyedDefinitions>) -> Self {
        Self {
            source,
            definitions: RwLock::new(HashMap::new()),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the resolved cache
    pub hits: u64,
    /// Lookups that had to resolve or synthesize (or found nothing)
    pub misses: u64,
    /// Definitions created from patterns
    pub synthesized: u64,
    /// Keys with a resolved cache
    pub keys: usize,
}

impl CacheStats {
    /// Hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Caching, inheritance-resolving, pattern-aware definition lookup
#[derive(Debug)]
pub struct DefinitionCache<K: CustomizationKey = Locale> {
    store: DefinitionStore<K>,
    resolved: RwLock<HashMap<K, Arc<ResolvedKey>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    synthesized: AtomicU64,
}

impl<K: CustomizationKey> Default for DefinitionCache<K> {
    fn default() -> Self {
        Self::new(DefinitionStore::default())
    }
}

impl<K: CustomizationKey> DefinitionCache<K> {
    /// Create a cache over `store`
    pub fn new(store: DefinitionStore<K>) -> Self {
        Self {
            store,
            resolved: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            synthesized: AtomicU64::new(0),
        }
    }

    /// Create a cache over the given sources, in registration order
    pub fn with_sources<I>(patterns: PatternConfig, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn DefinitionSource<K>>>,
    {
        let store = sources
            .into_iter()
            .fold(DefinitionStore::new(patterns), DefinitionStore::with_source);
        Self::new(store)
    }

    pub fn store(&self) -> &DefinitionStore<K> {
        &self.store
    }

    /// Look up a fully resolved definition
    ///
    /// `Ok(None)` means no exact or pattern match exists for the key or any
    /// of its fallbacks. Resolution errors are never cached: a broken
    /// definition fails every lookup of it.
    pub fn lookup(&self, name: &str, key: &K) -> Result<Option<Arc<Definition>>> {
        let keyed = self.store.get(key)?;
        let entry = self.entry_for(key, &keyed)?;

        {
            let definitions = entry.definitions.read().map_err(|_| DefsError::LockPoisoned)?;
            if let Some(found) = definitions.get(name) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(definition = %name, key = ?key, "cache hit");
                return Ok(Some(found.clone()));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut definitions = entry.definitions.write().map_err(|_| DefsError::LockPoisoned)?;
        if let Some(found) = definitions.get(name) {
            return Ok(Some(found.clone()));
        }

        let raw = match keyed.get(name) {
            Some(raw) => raw.clone(),
            None => match self.store.patterns().resolve_definition(name, keyed.patterns()) {
                Some(created) => {
                    self.synthesized.fetch_add(1, Ordering::Relaxed);
                    created
                }
                None => {
                    tracing::trace!(definition = %name, key = ?key, "no such definition");
                    return Ok(None);
                }
            },
        };

        let resolved = {
            let cached = &*definitions;
            // Parents come from exact names only, never from patterns
            let mut resolver = InheritanceResolver::new(|parent: &str| {
                let Some(raw) = keyed.get(parent) else {
                    return Ok(None);
                };
                Ok(Some(match cached.get(parent) {
                    Some(done) => Definition::clone(done),
                    None => raw.clone(),
                }))
            });
            Arc::new(resolver.resolve(&raw)?)
        };

        definitions.insert(name.to_string(), resolved.clone());
        Ok(Some(resolved))
    }

    /// Like [`Self::lookup`], but absence is an error
    pub fn get(&self, name: &str, key: &K) -> Result<Arc<Definition>> {
        self.lookup(name, key)?
            .ok_or_else(|| DefsError::DefinitionNotFound {
                name: name.to_string(),
                key: format!("{:?}", key),
            })
    }

    /// Every exact-named definition of `key`, fully resolved, in registration order
    pub fn resolve_key(&self, key: &K) -> Result<IndexMap<String, Arc<Definition>>> {
        let keyed = self.store.get(key)?;
        let mut resolved = IndexMap::with_capacity(keyed.len());
        for name in keyed.names() {
            if let Some(definition) = self.lookup(name, key)? {
                resolved.insert(name.clone(), definition);
            }
        }
        Ok(resolved)
    }

    /// Drop every loaded key and resolved definition
    pub fn reset(&self) -> Result<()> {
        self.store.invalidate()?;
        self.resolved
            .write()
            .map_err(|_| DefsError::LockPoisoned)?
            .clear();
        Ok(())
    }

    pub fn set_refresh_enabled(&self, enabled: bool) {
        self.store.set_refresh_enabled(enabled);
    }

    pub fn refresh_enabled(&self) -> bool {
        self.store.refresh_enabled()
    }

    /// Re-check sources now; clears everything if any changed
    pub fn refresh(&self) -> Result<bool> {
        let changed = self.store.refresh()?;
        if changed {
            self.resolved
                .write()
                .map_err(|_| DefsError::LockPoisoned)?
                .clear();
        }
        Ok(changed)
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            synthesized: self.synthesized.load(Ordering::Relaxed),
            keys: self.resolved.read().map(|r| r.len()).unwrap_or(0),
        }
    }

    /// Resolved cache for `key`, replaced whenever the store reloaded the key
    fn entry_for(
        &self,
        key: &K,
        keyed: &Arc<KeyedDefinitions>,
    ) -> Result<Arc<ResolvedKey>> {
        {
            let resolved = self.resolved.read().map_err(|_| DefsError::LockPoisoned)?;
            if let Some(entry) = resolved.get(key) {
                if Arc::ptr_eq(&entry.source, keyed) {
                    return Ok(entry.clone());
                }
            }
        }

        let mut resolved = self.resolved.write().map_err(|_| DefsError::LockPoisoned)?;
        match resolved.get(key) {
            Some(entry) if Arc::ptr_eq(&entry.source, keyed) => Ok(entry.clone()),
            _ => {
                let entry = Arc::new(ResolvedKey::new(keyed.clone()));
                resolved.insert(key.clone(), entry.clone());
                Ok(entry)
            }
        }
    }
}

impl DefinitionCache<Locale> {
    /// Build a cache reading the JSON files named by `config`
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let store = config
            .sources
            .iter()
            .fold(DefinitionStore::new(config.patterns.clone()), |store, source| {
                store.with_source(Arc::new(JsonFileSource::new(&source.path)))
            });
        store.set_refresh_enabled(config.refresh_enabled);

        tracing::debug!(
            sources = store.source_count(),
            refresh = config.refresh_enabled,
            "definition cache configured"
        );
        Ok(Self::new(store))
    }
}
