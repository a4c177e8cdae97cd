//! Error types for definition resolution
//!
//! Every failure the engine can report is a [`DefsError`] variant with:
//! - A human-readable message naming the definitions involved
//! - A stable error code for programmatic handling
//! - A category for grouping
//!
//! Absence is not an error: [`crate::DefinitionCache::lookup`] reports an
//! unknown name as `Ok(None)`. [`DefsError::DefinitionNotFound`] only comes
//! from the convenience accessors that require a definition to exist.
//!
//! # Example
//!
//! ```rust
//! use tiledefs_core::error::{DefsError, ErrorCategory};
//!
//! fn report(err: DefsError) {
//!     match err.category() {
//!         ErrorCategory::Inheritance => eprintln!("misconfigured definitions: {err}"),
//!         ErrorCategory::NotFound => eprintln!("falling back to the default layout"),
//!         _ => eprintln!("{}: {err}", err.error_code()),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for definition operations
pub type Result<T> = std::result::Result<T, DefsError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Requested definition does not exist
    NotFound,
    /// A runtime-registered definition failed validation
    Validation,
    /// The inheritance graph is broken (missing or circular ancestors)
    Inheritance,
    /// Patterns or engine configuration are malformed
    Configuration,
    /// A source loader or the filesystem failed
    External,
    /// Internal error (poisoned locks)
    Internal,
}

/// Errors that can occur while loading, resolving or registering definitions
#[derive(Error, Debug)]
pub enum DefsError {
    // ═══════════════════════════════════════════════════════════════════════
    // Inheritance errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The parent named by `extends` is not defined anywhere in the fallback chain
    #[error("Definition '{definition}' extends '{ancestor}', which is not defined for this key or any of its fallbacks.")]
    MissingAncestor { definition: String, ancestor: String },

    /// A definition transitively extends itself
    #[error("Circular inheritance detected for definition '{definition}': {}", chain.join(" -> "))]
    CircularInheritance { definition: String, chain: Vec<String> },

    // ═══════════════════════════════════════════════════════════════════════
    // Lookup and validation errors
    // ═══════════════════════════════════════════════════════════════════════

    /// No exact, inherited or pattern-synthesized definition matched
    #[error("Definition not found: '{name}' (key {key}).")]
    DefinitionNotFound { name: String, key: String },

    /// A runtime-registered definition carries an attribute without value or expression
    #[error("Attribute '{attribute}' of definition '{definition}' has neither a value nor an expression.")]
    MissingAttributeValue { definition: String, attribute: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Configuration errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A pattern-marked definition name could not be compiled
    #[error("Invalid definition pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Engine configuration is malformed
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Source and infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The external source loader failed
    #[error("Failed to load definitions from source '{source_id}': {reason}")]
    SourceLoad { source_id: String, reason: String },

    /// I/O operation failed
    #[error("IO error on '{path}': {reason}")]
    Io { path: String, reason: String },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A lock is poisoned (a panic occurred while holding it)
    #[error("Definition cache lock poisoned. This is a bug; please report it.")]
    LockPoisoned,
}

impl DefsError {
    /// Returns true if this error might succeed on a later attempt
    ///
    /// Resolution errors describe a misconfigured definition set and never
    /// go away by themselves; source and I/O errors may.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DefsError::SourceLoad { .. } | DefsError::Io { .. } | DefsError::LockPoisoned
        )
    }

    /// Returns true if this error indicates a broken inheritance graph
    pub fn is_resolution_error(&self) -> bool {
        self.category() == ErrorCategory::Inheritance
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            DefsError::DefinitionNotFound { .. } => ErrorCategory::NotFound,

            DefsError::MissingAttributeValue { .. } => ErrorCategory::Validation,

            DefsError::MissingAncestor { .. }
            | DefsError::CircularInheritance { .. } => ErrorCategory::Inheritance,

            DefsError::InvalidPattern { .. }
            | DefsError::InvalidConfig { .. } => ErrorCategory::Configuration,

            DefsError::SourceLoad { .. }
            | DefsError::Io { .. }
            | DefsError::Json(_) => ErrorCategory::External,

            DefsError::LockPoisoned => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DefsError::MissingAncestor { .. } => "MISSING_ANCESTOR",
            DefsError::CircularInheritance { .. } => "CIRCULAR_INHERITANCE",
            DefsError::DefinitionNotFound { .. } => "DEFINITION_NOT_FOUND",
            DefsError::MissingAttributeValue { .. } => "MISSING_ATTRIBUTE_VALUE",
            DefsError::InvalidPattern { .. } => "INVALID_PATTERN",
            DefsError::InvalidConfig { .. } => "INVALID_CONFIG",
            DefsError::SourceLoad { .. } => "SOURCE_LOAD_ERROR",
            DefsError::Io { .. } => "IO_ERROR",
            DefsError::Json(_) => "JSON_ERROR",
            DefsError::LockPoisoned => "LOCK_POISONED",
        }
    }

    /// Converts this error to a JSON-serializable response object
    ///
    /// ```json
    /// {
    ///   "error": {
    ///     "code": "MISSING_ANCESTOR",
    ///     "message": "Definition 'child' extends 'ghost', ...",
    ///     "category": "inheritance",
    ///     "recoverable": false
    ///   }
    /// }
    /// ```
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

/// JSON-serializable error response for hosts reporting over an API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail for JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "MISSING_ANCESTOR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Whether retry might succeed
    pub recoverable: bool,
}
