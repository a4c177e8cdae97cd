//! Inheritance resolution
//!
//! Resolving a definition merges its whole parent chain into a fresh copy:
//! parents are resolved first, then merged field-wise into the child. Stored
//! definitions are never mutated, so readers never observe a half-merged
//! record.
//!
//! Each [`InheritanceResolver`] owns its bookkeeping: the chain of names
//! currently being resolved (a name seen twice on it is a cycle) and the
//! definitions already resolved (so diamond-shaped graphs reuse the shared
//! ancestor instead of tripping the cycle check). Concurrent resolutions use
//! separate resolvers and never share that state.

use std::collections::HashMap;

use crate::definition::{Definition, DefinitionMap};
use crate::error::{DefsError, Result};

/// Resolves definitions against a name lookup
///
/// The lookup returns the raw (or already resolved) definition for a name
/// and must already encapsulate any fallback across customization keys.
pub struct InheritanceResolver<F> {
    lookup: F,
    resolved: HashMap<String, Definition>,
    in_progress: Vec<String>,
}

impl<F> InheritanceResolver<F>
where
    F: FnMut(&str) -> Result<Option<Definition>>,
{
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Resolve one definition, returning a fully merged copy
    ///
    /// Definitions that extend nothing or were already resolved come back
    /// unchanged.
    pub fn resolve(&mut self, definition: &Definition) -> Result<Definition> {
        if definition.is_resolved() {
            return Ok(definition.clone());
        }

        let name = definition.display_name().to_string();
        if let Some(done) = self.resolved.get(&name) {
            if definition.name.is_some() {
                return Ok(done.clone());
            }
        }

        if self.in_progress.contains(&name) {
            let mut chain = self.in_progress.clone();
            chain.push(name.clone());
            let start = chain.iter().position(|n| *n == name).unwrap_or(0);
            return Err(DefsError::CircularInheritance {
                definition: name,
                chain: chain.split_off(start),
            });
        }

        let Some(parent_name) = definition.extends.clone() else {
            return Ok(definition.clone());
        };

        self.in_progress.push(name.clone());
        let result = self.merge_with_parent(definition, &name, &parent_name);
        self.in_progress.pop();

        let merged = result?;
        if definition.name.is_some() {
            self.resolved.insert(name, merged.clone());
        }
        Ok(merged)
    }

    fn merge_with_parent(
        &mut self,
        definition: &Definition,
        name: &str,
        parent_name: &str,
    ) -> Result<Definition> {
        let parent = match self.resolved.get(parent_name) {
            Some(parent) => parent.clone(),
            None => {
                let raw = (self.lookup)(parent_name)?.ok_or_else(|| DefsError::MissingAncestor {
                    definition: name.to_string(),
                    ancestor: parent_name.to_string(),
                })?;
                self.resolve(&raw)?
            }
        };

        let mut merged = definition.clone();
        merged.inherit(&parent);
        merged.mark_resolved();

        tracing::trace!(definition = %name, parent = %parent_name, "resolved inheritance");
        Ok(merged)
    }
}

/// Resolve every definition of a set against the set itself
///
/// Each definition is resolved exactly once; parents are resolved before
/// their children and shared ancestors are reused.
pub fn resolve_all(definitions: &DefinitionMap) -> Result<DefinitionMap> {
    let mut resolver =
        InheritanceResolver::new(|name: &str| Ok(definitions.get(name).cloned()));

    definitions
        .iter()
        .map(|(name, definition)| Ok((name.clone(), resolver.resolve(definition)?)))
        .collect()
}
