//! # Tiledefs Core
//!
//! A definition engine for composite page layouts:
//!
//! - **Definitions**: named records of a template, a parent to inherit
//!   from, roles, a preparer and attributes
//! - **Inheritance**: field-wise merge along the `extends` chain, with cycle
//!   detection and copy-on-resolve semantics
//! - **Customization keys**: parallel definition sets (e.g. per locale) that
//!   fall back to less specific keys
//! - **Patterns**: wildcard and regexp definitions that synthesize concrete
//!   definitions for names nobody declared
//! - **Scopes**: caller-local runtime overrides layered on the shared cache
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tiledefs_core::{
//!     Attribute, Definition, DefinitionCache, DefinitionManager, DefinitionStore,
//!     InMemorySource, Locale, Scope,
//! };
//!
//! let source = Arc::new(InMemorySource::new("inline"));
//! source.set(Locale::root(), vec![
//!     Definition::new("layout")
//!         .with_template("/layout.jsp")
//!         .with_attribute("title", Attribute::text("Site")),
//!     Definition::new("WILDCARD:news/*")
//!         .extending("layout")
//!         .with_attribute("body", Attribute::template("/news/{1}.jsp")),
//! ]);
//!
//! let store = DefinitionStore::<Locale>::default().with_source(source);
//! let cache = Arc::new(DefinitionCache::new(store));
//!
//! // Synthesized from the pattern, then merged with its parent
//! let sports = cache.lookup("news/sports", &"en_US".parse().unwrap()).unwrap().unwrap();
//! assert_eq!(sports.template_path(), Some("/layout.jsp"));
//! assert_eq!(sports.attribute("body").unwrap().as_text(), Some("/news/sports.jsp"));
//!
//! // Runtime overrides stay in their scope
//! let manager = DefinitionManager::new(cache.clone());
//! let scope = Scope::new(Locale::root());
//! manager.add_definition(Definition::new("layout").with_template("/print.jsp"), &scope).unwrap();
//! assert_eq!(
//!     manager.get_definition("layout", &scope).unwrap().unwrap().template_path(),
//!     Some("/print.jsp")
//! );
//! assert_eq!(
//!     cache.lookup("layout", &Locale::root()).unwrap().unwrap().template_path(),
//!     Some("/layout.jsp")
//! );
//! ```

pub mod cache;
pub mod config;
pub mod definition;
pub mod error;
pub mod inheritance;
pub mod key;
pub mod manager;
pub mod pattern;
pub mod source;
pub mod store;

// Re-export main types
pub use cache::{CacheStats, DefinitionCache};
pub use config::{EngineConfig, PatternConfig, SourceConfig};
pub use definition::{Attribute, AttributeValue, Definition, DefinitionMap, Expression};
pub use error::{DefsError, ErrorCategory, ErrorDetail, ErrorResponse, Result};
pub use inheritance::{resolve_all, InheritanceResolver};
pub use key::{CustomizationKey, Locale};
pub use manager::{DefinitionManager, Scope, ANONYMOUS_PREFIX};
pub use pattern::{DefinitionPatternMatcher, PatternKind, PatternResolver};
pub use source::{DefinitionFile, DefinitionSource, InMemorySource, JsonFileSource};
pub use store::{DefinitionStore, KeyedDefinitions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
