//! Scoped runtime definitions
//!
//! A [`Scope`] is a caller-owned override namespace (one per request,
//! session or job) for a single customization key. Definitions registered
//! through the [`DefinitionManager`] land in the scope only: they shadow the
//! shared definitions for lookups through that scope and are invisible
//! everywhere else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::cache::DefinitionCache;
use crate::definition::Definition;
use crate::error::{DefsError, Result};
use crate::inheritance::InheritanceResolver;
use crate::key::{CustomizationKey, Locale};

/// Prefix of names given to definitions registered without one
pub const ANONYMOUS_PREFIX: &str = "$anonymous";

type Overrides = IndexMap<String, Arc<Definition>>;

/// Caller-local override namespace
#[derive(Debug)]
pub struct Scope<K: CustomizationKey = Locale> {
    id: Uuid,
    key: K,
    /// Created on first registration
    overrides: Mutex<Option<Overrides>>,
    next_anonymous: AtomicU64,
    created_at: DateTime<Utc>,
}

impl<K: CustomizationKey> Scope<K> {
    /// Create an empty scope resolving against `key`
    pub fn new(key: K) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            overrides: Mutex::new(None),
            next_anonymous: AtomicU64::new(1),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Definition registered in this scope, if any
    pub fn get(&self, name: &str) -> Option<Arc<Definition>> {
        self.overrides
            .lock()
            .ok()?
            .as_ref()
            .and_then(|overrides| overrides.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names registered in this scope, in registration order
    pub fn names(&self) -> Vec<String> {
        self.overrides
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|o| o.keys().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.overrides
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(IndexMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registered definition
    pub fn clear(&self) {
        if let Ok(mut overrides) = self.overrides.lock() {
            *overrides = None;
        }
    }

    /// Next counter-based name not yet used in `overrides`
    fn anonymous_name(&self, overrides: &Overrides) -> String {
        loop {
            let n = self.next_anonymous.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}{}", ANONYMOUS_PREFIX, n);
            if !overrides.contains_key(&name) {
                return name;
            }
        }
    }
}

/// Layers scoped runtime definitions over a shared [`DefinitionCache`]
#[derive(Debug, Clone)]
pub struct DefinitionManager<K: CustomizationKey = Locale> {
    cache: Arc<DefinitionCache<K>>,
}

impl<K: CustomizationKey> DefinitionManager<K> {
    pub fn new(cache: Arc<DefinitionCache<K>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<DefinitionCache<K>> {
        &self.cache
    }

    /// Register `definition` in `scope`, returning the name it was stored under
    ///
    /// Unnamed definitions get a fresh `$anonymousN` name. Every attribute
    /// must carry a value or an expression. A parent is resolved right away,
    /// scope first and then the shared definitions of the scope's key.
    pub fn add_definition(&self, mut definition: Definition, scope: &Scope<K>) -> Result<String> {
        let mut guard = scope.overrides.lock().map_err(|_| DefsError::LockPoisoned)?;
        let overrides = guard.get_or_insert_with(IndexMap::new);

        let name = match definition.name.clone() {
            Some(name) => name,
            None => {
                let name = scope.anonymous_name(overrides);
                definition.name = Some(name.clone());
                name
            }
        };

        validate(&definition)?;

        let definition = if definition.is_extending() {
            let scoped = &*overrides;
            let mut resolver = InheritanceResolver::new(|parent: &str| {
                if let Some(found) = scoped.get(parent) {
                    return Ok(Some(Definition::clone(found)));
                }
                Ok(self
                    .cache
                    .lookup(parent, &scope.key)?
                    .map(|found| Definition::clone(&found)))
            });
            resolver.resolve(&definition)?
        } else {
            definition
        };

        overrides.insert(name.clone(), Arc::new(definition));
        tracing::debug!(scope = %scope.id, definition = %name, "registered scoped definition");
        Ok(name)
    }

    /// Scoped definition if registered, otherwise the shared one
    pub fn get_definition(&self, name: &str, scope: &Scope<K>) -> Result<Option<Arc<Definition>>> {
        if let Some(found) = scope.get(name) {
            return Ok(Some(found));
        }
        self.cache.lookup(name, &scope.key)
    }
}

/// Every local and cascaded attribute needs a value or an expression
fn validate(definition: &Definition) -> Result<()> {
    match definition.all_attributes().find(|(_, attribute)| attribute.is_empty()) {
        Some((attribute, _)) => Err(DefsError::MissingAttributeValue {
            definition: definition.display_name().to_string(),
            attribute: attribute.clone(),
        }),
        None => Ok(()),
    }
}
