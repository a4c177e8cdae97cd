//! Pattern-based definition synthesis
//!
//! A definition whose name carries a pattern marker is not looked up by
//! name. It becomes a matcher: when a lookup misses, the matchers registered
//! for the key are tried and the first one that matches synthesizes a
//! concrete definition from its template.
//!
//! ```text
//! WILDCARD:news/*          name "news/sports"
//!   template /news.jsp       ──────────────▶  template /news.jsp
//!   body     /news/{1}.jsp                     body     /news/sports.jsp
//! ```
//!
//! Families are consulted in [`PatternConfig::families`] order, and within a
//! family in registration order. First match wins.

mod matcher;
mod substitute;

pub use matcher::{wildcard_to_regex, DefinitionPatternMatcher, PatternKind};
pub use substitute::{replace_placeholders, substitute_definition};

use crate::config::PatternConfig;
use crate::definition::{Definition, DefinitionMap};
use crate::error::Result;

/// Classifies pattern-marked names, compiles them and synthesizes from them
///
/// Holds no per-key state: the compiled matchers of a key live with that
/// key's loaded definitions, so a lookup always synthesizes from the same
/// snapshot it found its exact names in.
#[derive(Debug, Clone, Default)]
pub struct PatternResolver {
    config: PatternConfig,
}

impl PatternResolver {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Family and bare pattern for `name`, if it is pattern-marked
    pub fn classify<'a>(&self, name: &'a str) -> Option<(PatternKind, &'a str)> {
        for kind in &self.config.families {
            if let Some(pattern) = name.strip_prefix(kind.prefix()) {
                return Some((*kind, pattern));
            }
        }

        if self.config.bare_wildcards
            && self.config.families.contains(&PatternKind::Wildcard)
            && name.contains('*')
        {
            return Some((PatternKind::Wildcard, name));
        }

        None
    }

    /// Split `definitions` into concrete definitions and compiled matchers
    ///
    /// Matchers keep registration order. `key` is only used for logging.
    pub fn store_definition_patterns<K: std::fmt::Debug>(
        &self,
        definitions: DefinitionMap,
        key: &K,
    ) -> Result<(DefinitionMap, Vec<DefinitionPatternMatcher>)> {
        let mut concrete = DefinitionMap::with_capacity(definitions.len());
        let mut matchers = Vec::new();

        for (name, definition) in definitions {
            match self.classify(&name) {
                Some((kind, pattern)) => {
                    matchers.push(DefinitionPatternMatcher::compile(kind, pattern, definition)?);
                }
                None => {
                    if self.has_disabled_prefix(&name) {
                        tracing::warn!(
                            definition = %name,
                            "pattern prefix of a disabled family; keeping as a plain name"
                        );
                    }
                    concrete.insert(name, definition);
                }
            }
        }

        tracing::debug!(
            key = ?key,
            patterns = matchers.len(),
            definitions = concrete.len(),
            "stored definition patterns"
        );

        Ok((concrete, matchers))
    }

    /// Synthesize a definition for `name` from `matchers`
    pub fn resolve_definition(
        &self,
        name: &str,
        matchers: &[DefinitionPatternMatcher],
    ) -> Option<Definition> {
        for kind in &self.config.families {
            for matcher in matchers.iter().filter(|m| m.kind() == *kind) {
                if let Some(definition) = matcher.create_definition(name) {
                    tracing::trace!(
                        definition = %name,
                        pattern = %matcher.pattern(),
                        family = %kind,
                        "synthesized definition from pattern"
                    );
                    return Some(definition);
                }
            }
        }

        None
    }

    fn has_disabled_prefix(&self, name: &str) -> bool {
        [PatternKind::Wildcard, PatternKind::Regexp]
            .iter()
            .any(|kind| !self.config.families.contains(kind) && name.starts_with(kind.prefix()))
    }
}
