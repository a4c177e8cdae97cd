//! Configuration for the definition engine

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DefsError, Result};
use crate::pattern::PatternKind;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Check sources for changes before every lookup
    #[serde(default)]
    pub refresh_enabled: bool,

    /// Pattern configuration
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Definition files, in registration order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl EngineConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DefsError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// Relative source paths are taken relative to the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DefsError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config = Self::from_json(&content)?;
        if let Some(base) = path.parent() {
            for source in &mut config.sources {
                if source.path.is_relative() {
                    source.path = base.join(&source.path);
                }
            }
        }
        Ok(config)
    }

    pub fn with_refresh(mut self, enabled: bool) -> Self {
        self.refresh_enabled = enabled;
        self
    }

    pub fn with_source<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.sources.push(SourceConfig { path: path.into() });
        self
    }

    pub fn with_patterns(mut self, patterns: PatternConfig) -> Self {
        self.patterns = patterns;
        self
    }

    /// Reject configurations the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        let families = &self.patterns.families;
        for (index, kind) in families.iter().enumerate() {
            if families[..index].contains(kind) {
                return Err(DefsError::InvalidConfig {
                    reason: format!("pattern family '{}' listed twice", kind),
                });
            }
        }
        Ok(())
    }
}

/// Pattern configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Enabled pattern families; earlier families take precedence
    #[serde(default = "default_families")]
    pub families: Vec<PatternKind>,

    /// Treat unprefixed names containing `*` as wildcard patterns
    #[serde(default = "default_true")]
    pub bare_wildcards: bool,
}

fn default_true() -> bool { true }

fn default_families() -> Vec<PatternKind> {
    vec![PatternKind::Wildcard, PatternKind::Regexp]
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            families: default_families(),
            bare_wildcards: true,
        }
    }
}

/// A definition file source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root-locale file; localized siblings are found next to it
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert!(!config.refresh_enabled);
        assert_eq!(config.patterns, PatternConfig::default());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = EngineConfig::from_json(
            r#"{
                "refresh_enabled": true,
                "patterns": { "families": ["regexp"], "bare_wildcards": false },
                "sources": [{ "path": "defs/tiles.json" }, { "path": "defs/extra.json" }]
            }"#,
        )
        .unwrap();

        assert!(config.refresh_enabled);
        assert_eq!(config.patterns.families, vec![PatternKind::Regexp]);
        assert!(!config.patterns.bare_wildcards);
        assert_eq!(config.sources[1].path, PathBuf::from("defs/extra.json"));
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let err = EngineConfig::from_json(r#"{"patterns": {"families": ["wildcard", "wildcard"]}}"#)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_unknown_family_rejected() {
        assert!(EngineConfig::from_json(r#"{"patterns": {"families": ["glob"]}}"#).is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_sources() {
        let dir = std::env::temp_dir().join(format!("tiledefs-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.json");
        fs::write(&path, r#"{"sources": [{"path": "tiles.json"}]}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.sources[0].path, dir.join("tiles.json"));

        fs::remove_dir_all(&dir).ok();
    }
}
