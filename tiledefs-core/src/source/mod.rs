//! Pluggable definition sources
//!
//! A source hands the store already-parsed definitions for one
//! customization key and can tell whether its content changed since it was
//! last loaded. The engine never retries a failing source; errors propagate
//! to the lookup that triggered the load.
//!
//! # Example
//!
//! ```rust
//! use tiledefs_core::source::{DefinitionSource, InMemorySource};
//! use tiledefs_core::{Definition, Locale};
//!
//! let source = InMemorySource::new("inline");
//! source.insert(Locale::root(), Definition::new("layout").with_template("/layout.jsp"));
//!
//! let loaded = source.load(&Locale::root()).unwrap();
//! assert!(loaded.contains_key("layout"));
//! ```

mod json_file;
mod memory;

pub use json_file::{DefinitionFile, JsonFileSource};
pub use memory::InMemorySource;

use crate::definition::DefinitionMap;
use crate::error::Result;
use crate::key::CustomizationKey;

/// Source trait for raw definitions
///
/// Implement this trait to feed definitions from other formats or stores.
/// All methods take `&self`; implementations use interior mutability to
/// remember what they loaded.
pub trait DefinitionSource<K: CustomizationKey>: Send + Sync {
    /// Identifier used in errors and logs
    fn id(&self) -> &str;

    /// Definitions contributed for exactly `key`, without fallback
    fn load(&self, key: &K) -> Result<DefinitionMap>;

    /// Whether anything loaded so far has changed since it was loaded
    fn has_changed(&self) -> bool;

    /// Forget everything loaded so far
    ///
    /// Called when the store drops its loaded keys. Afterwards
    /// `has_changed` only considers keys loaded again.
    fn forget_loaded(&self) {}
}
