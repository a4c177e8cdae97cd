//! JSON file definition source
//!
//! Reads definition files of the form:
//!
//! ```json
//! {
//!   "definitions": [
//!     { "name": "layout", "template": "/layout.jsp", "attributes": { "title": "Site" } },
//!     { "name": "home", "extends": "layout", "attributes": { "body": "/home.jsp" } }
//!   ]
//! }
//! ```
//!
//! Localized variants live next to the base file with the locale appended
//! to the stem: `tiles.json`, `tiles_en.json`, `tiles_en_US.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::definition::{Definition, DefinitionMap};
use crate::error::{DefsError, Result};
use crate::key::{CustomizationKey, Locale};

use super::DefinitionSource;

/// On-disk shape of a definition file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

/// What a file looked like when it was loaded
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<std::time::SystemTime>,
    digest: String,
}

/// Definitions read from a JSON file and its localized siblings
#[derive(Debug)]
pub struct JsonFileSource {
    id: String,
    base_path: PathBuf,
    /// Fingerprint per loaded path; `None` records a localized file that was absent
    fingerprints: Mutex<HashMap<PathBuf, Option<Fingerprint>>>,
}

impl JsonFileSource {
    /// Create a source rooted at `path` (the root-locale file)
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let base_path = path.into();
        Self {
            id: base_path.display().to_string(),
            base_path,
            fingerprints: Mutex::new(HashMap::new()),
        }
    }

    /// Base file path
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// File holding the definitions for exactly `locale`
    pub fn path_for(&self, locale: &Locale) -> PathBuf {
        if locale.is_root() {
            return self.base_path.clone();
        }

        let stem = self
            .base_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match self.base_path.extension() {
            Some(ext) => format!("{}{}.{}", stem, locale.file_suffix(), ext.to_string_lossy()),
            None => format!("{}{}", stem, locale.file_suffix()),
        };
        self.base_path.with_file_name(file_name)
    }

    fn load_error(&self, path: &Path, reason: impl std::fmt::Display) -> DefsError {
        DefsError::SourceLoad {
            source_id: self.id.clone(),
            reason: format!("{}: {}", path.display(), reason),
        }
    }

    fn record(&self, path: PathBuf, fingerprint: Option<Fingerprint>) {
        if let Ok(mut fingerprints) = self.fingerprints.lock() {
            fingerprints.insert(path, fingerprint);
        }
    }

    fn parse(&self, path: &Path, content: &str) -> Result<DefinitionMap> {
        let file: DefinitionFile =
            serde_json::from_str(content).map_err(|e| self.load_error(path, e))?;

        let mut definitions = DefinitionMap::new();
        for (index, definition) in file.definitions.into_iter().enumerate() {
            let Some(name) = definition.name.clone() else {
                return Err(self.load_error(path, format!("definition #{} has no name", index)));
            };
            definitions.insert(name, definition);
        }
        Ok(definitions)
    }
}

fn digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Current fingerprint of `path`, `None` when the file does not exist
///
/// `previous` short-circuits hashing when length and modification time match.
fn fingerprint(path: &Path, previous: Option<&Fingerprint>) -> Option<Fingerprint> {
    let metadata = fs::metadata(path).ok()?;
    let len = metadata.len();
    let modified = metadata.modified().ok();

    if let Some(previous) = previous {
        if previous.len == len && previous.modified.is_some() && previous.modified == modified {
            return Some(previous.clone());
        }
    }

    let content = fs::read(path).ok()?;
    Some(Fingerprint {
        len,
        modified,
        digest: digest(&content),
    })
}

impl DefinitionSource<Locale> for JsonFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self, key: &Locale) -> Result<DefinitionMap> {
        let path = self.path_for(key);

        if !path.is_file() {
            if key.is_root() {
                return Err(self.load_error(&path, "file not found"));
            }
            self.record(path, None);
            return Ok(DefinitionMap::new());
        }

        // Metadata first: a write racing the read then shows up as a newer mtime
        let modified = fs::metadata(&path).ok().and_then(|m| m.modified().ok());
        let content = fs::read(&path).map_err(|e| self.load_error(&path, e))?;
        let text = String::from_utf8_lossy(&content);
        let definitions = self.parse(&path, &text)?;

        self.record(
            path.clone(),
            Some(Fingerprint {
                len: content.len() as u64,
                modified,
                digest: digest(&content),
            }),
        );

        tracing::debug!(
            source = %self.id,
            path = %path.display(),
            count = definitions.len(),
            "loaded definition file"
        );

        Ok(definitions)
    }

    fn has_changed(&self) -> bool {
        let Ok(fingerprints) = self.fingerprints.lock() else {
            return false;
        };

        fingerprints.iter().any(|(path, recorded)| {
            let current = fingerprint(path, recorded.as_ref());
            match (recorded, &current) {
                (None, None) => false,
                (Some(before), Some(now)) => before.digest != now.digest,
                _ => true,
            }
        })
    }

    fn forget_loaded(&self) {
        if let Ok(mut fingerprints) = self.fingerprints.lock() {
            fingerprints.clear();
        }
    }
}
