//! Definition store
//!
//! Loads raw definitions per customization key and composes them along the
//! fallback chain:
//!
//! ```text
//!   root  ── sources(root) ─────────────────────┐
//!    │                                           ▼
//!    └─▶ en  ── seed(root) + sources(en) ───▶ patterns(en) ─▶ concrete(en)
//!         │
//!         └─▶ en_US ── seed(en) + sources(en_US) ─▶ patterns(en_US) ─▶ concrete(en_US)
//! ```
//!
//! Every key is loaded at most once until the store is invalidated. Each key
//! has its own slot lock: loading `en_US` and `fr` in parallel never
//! contends, while two threads loading `en_US` load it once.
//!
//! A loaded key is an immutable snapshot holding both its exact-named
//! definitions and its compiled patterns. Invalidation only drops snapshots;
//! readers keep whatever snapshot they already hold.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use crate::config::PatternConfig;
use crate::definition::{Definition, DefinitionMap};
use crate::error::{DefsError, Result};
use crate::key::CustomizationKey;
use crate::pattern::{DefinitionPatternMatcher, PatternResolver};
use crate::source::DefinitionSource;

/// Raw definitions of one key, fallback entries included
#[derive(Debug, Clone)]
pub struct KeyedDefinitions {
    /// Everything loaded for the key and its fallbacks, patterns included
    raw: DefinitionMap,
    /// Raw definitions addressable by exact name
    concrete: DefinitionMap,
    /// Compiled patterns, in registration order
    patterns: Vec<DefinitionPatternMatcher>,
    loaded_at: DateTime<Utc>,
}

impl KeyedDefinitions {
    /// Raw (unresolved) definition by exact name
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.concrete.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.concrete.contains_key(name)
    }

    /// Exact names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.concrete.keys()
    }

    pub fn len(&self) -> usize {
        self.concrete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concrete.is_empty()
    }

    /// Compiled patterns of the key, in registration order
    pub fn patterns(&self) -> &[DefinitionPatternMatcher] {
        &self.patterns
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

type Slot = Arc<Mutex<Option<Arc<KeyedDefinitions>>>>;

/// Per-key loader and cache of raw definitions
pub struct DefinitionStore<K: CustomizationKey> {
    sources: RwLock<Vec<Arc<dyn DefinitionSource<K>>>>,
    patterns: PatternResolver,
    slots: Mutex<HashMap<K, Slot>>,
    refresh_enabled: AtomicBool,
}

impl<K: CustomizationKey> std::fmt::Debug for DefinitionStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source_ids: Vec<String> = self
            .sources
            .read()
            .map(|s| s.iter().map(|s| s.id().to_string()).collect())
            .unwrap_or_default();
        f.debug_struct("DefinitionStore")
            .field("sources", &source_ids)
            .field("patterns", &self.patterns)
            .field("refresh_enabled", &self.refresh_enabled())
            .finish()
    }
}

impl<K: CustomizationKey> Default for DefinitionStore<K> {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}

impl<K: CustomizationKey> DefinitionStore<K> {
    /// Create a store without sources
    pub fn new(patterns: PatternConfig) -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            patterns: PatternResolver::new(patterns),
            slots: Mutex::new(HashMap::new()),
            refresh_enabled: AtomicBool::new(false),
        }
    }

    /// Register a source; later sources override earlier ones
    ///
    /// Invalidates everything loaded so far.
    pub fn add_source(&self, source: Arc<dyn DefinitionSource<K>>) -> Result<()> {
        self.sources
            .write()
            .map_err(|_| DefsError::LockPoisoned)?
            .push(source);
        self.invalidate()
    }

    /// Builder form of [`Self::add_source`] for freshly created stores
    pub fn with_source(self, source: Arc<dyn DefinitionSource<K>>) -> Self {
        if let Ok(mut sources) = self.sources.write() {
            sources.push(source);
        }
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn patterns(&self) -> &PatternResolver {
        &self.patterns
    }

    pub fn set_refresh_enabled(&self, enabled: bool) {
        self.refresh_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh_enabled.load(Ordering::SeqCst)
    }

    /// Definitions for `key`, loading it (and its fallbacks) on first use
    ///
    /// With refresh enabled, sources are checked for changes first.
    pub fn get(&self, key: &K) -> Result<Arc<KeyedDefinitions>> {
        if self.refresh_enabled() {
            self.refresh()?;
        }
        self.load(key)
    }

    /// Drop every loaded key if any source changed
    ///
    /// Returns whether anything was invalidated. Children are seeded from
    /// their parents, so invalidation always clears every key.
    pub fn refresh(&self) -> Result<bool> {
        let changed = {
            let sources = self.sources.read().map_err(|_| DefsError::LockPoisoned)?;
            sources.iter().any(|source| source.has_changed())
        };

        if changed {
            tracing::info!("definition source changed; clearing loaded keys");
            self.invalidate()?;
        }
        Ok(changed)
    }

    /// Drop every loaded key
    ///
    /// Sources forget what they loaded, so change detection only covers keys
    /// loaded from here on.
    pub fn invalidate(&self) -> Result<()> {
        let mut slots = self.slots.lock().map_err(|_| DefsError::LockPoisoned)?;
        slots.clear();
        for source in self.sources.read().map_err(|_| DefsError::LockPoisoned)?.iter() {
            source.forget_loaded();
        }
        Ok(())
    }

    /// Number of keys currently loaded or loading
    pub fn loaded_key_count(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn slot(&self, key: &K) -> Result<Slot> {
        let mut slots = self.slots.lock().map_err(|_| DefsError::LockPoisoned)?;
        Ok(slots.entry(key.clone()).or_default().clone())
    }

    fn load(&self, key: &K) -> Result<Arc<KeyedDefinitions>> {
        let slot = self.slot(key)?;
        let mut guard = slot.lock().map_err(|_| DefsError::LockPoisoned)?;
        if let Some(loaded) = guard.as_ref() {
            return Ok(loaded.clone());
        }

        let loaded = Arc::new(self.load_uncached(key)?);
        *guard = Some(loaded.clone());
        Ok(loaded)
    }

    fn load_uncached(&self, key: &K) -> Result<KeyedDefinitions> {
        let mut raw = match key.fallback_parent() {
            Some(parent) => self.load(&parent)?.raw.clone(),
            None => DefinitionMap::new(),
        };

        let sources: Vec<Arc<dyn DefinitionSource<K>>> = self
            .sources
            .read()
            .map_err(|_| DefsError::LockPoisoned)?
            .clone();
        for source in &sources {
            raw.extend(source.load(key)?);
        }

        let (concrete, patterns) = self.patterns.store_definition_patterns(raw.clone(), key)?;

        tracing::debug!(
            key = ?key,
            definitions = concrete.len(),
            patterns = patterns.len(),
            "loaded definitions"
        );

        Ok(KeyedDefinitions {
            raw,
            concrete,
            patterns,
            loaded_at: Utc::now(),
        })
    }
}
