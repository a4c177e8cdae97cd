//! Customization keys
//!
//! Definitions are resolved per customization key. A key knows its fallback
//! parent; following parents from any key ends at the root key, whose
//! definitions every other key inherits.
//!
//! ```rust
//! use tiledefs_core::{CustomizationKey, Locale};
//!
//! let key: Locale = "en_US_POSIX".parse().unwrap();
//! let chain: Vec<String> = key.fallback_chain().iter().map(Locale::to_string).collect();
//! assert_eq!(chain, ["en_US_POSIX", "en_US", "en", ""]);
//! ```

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DefsError;

/// A dimension along which parallel definition sets are resolved
pub trait CustomizationKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// The next less specific key, or `None` for the root key
    fn fallback_parent(&self) -> Option<Self>;

    /// This key followed by every fallback parent, ending at the root
    fn fallback_chain(&self) -> Vec<Self> {
        let mut chain = vec![self.clone()];
        while let Some(parent) = chain.last().and_then(CustomizationKey::fallback_parent) {
            chain.push(parent);
        }
        chain
    }

    /// Whether this is the universal fallback key
    fn is_root(&self) -> bool {
        self.fallback_parent().is_none()
    }
}

/// Engines that do not customize use the unit key
impl CustomizationKey for () {
    fn fallback_parent(&self) -> Option<Self> {
        None
    }
}

/// A `language_COUNTRY_VARIANT` locale; all parts empty is the root locale
///
/// Parts are positional: a variant without a country keeps an empty country
/// slot (`en__POSIX`), as locale identifiers do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    country: String,
    variant: String,
}

impl Locale {
    /// The root locale
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(
        language: impl Into<String>,
        country: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into().to_lowercase(),
            country: country.into().to_uppercase(),
            variant: variant.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Suffix appended to source file stems, e.g. `_en_US`; empty for root
    pub fn file_suffix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("_{}", self)
        }
    }
}

impl CustomizationKey for Locale {
    fn fallback_parent(&self) -> Option<Self> {
        if !self.variant.is_empty() {
            Some(Self {
                variant: String::new(),
                ..self.clone()
            })
        } else if !self.country.is_empty() {
            Some(Self {
                country: String::new(),
                ..self.clone()
            })
        } else if !self.language.is_empty() {
            Some(Self::root())
        } else {
            None
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if !self.country.is_empty() || !self.variant.is_empty() {
            write!(f, "_{}", self.country)?;
        }
        if !self.variant.is_empty() {
            write!(f, "_{}", self.variant)?;
        }
        Ok(())
    }
}

impl FromStr for Locale {
    type Err = DefsError;

    /// Parses `en`, `en_US`, `en-US`, `en_US_POSIX`; empty or `root` is the root locale
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("root") {
            return Ok(Self::root());
        }

        let mut parts = s.splitn(3, ['_', '-']);
        let language = parts.next().unwrap_or_default();
        let country = parts.next().unwrap_or_default();
        let variant = parts.next().unwrap_or_default();

        let valid = |part: &str| part.chars().all(|c| c.is_ascii_alphanumeric());
        if language.is_empty() || !valid(language) || !valid(country) || !valid(variant) {
            return Err(DefsError::InvalidConfig {
                reason: format!("'{}' is not a locale identifier", s),
            });
        }

        Ok(Self::new(language, country, variant))
    }
}

impl TryFrom<String> for Locale {
    type Error = DefsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let locale: Locale = "en-us".parse().unwrap();
        assert_eq!(locale.language(), "en");
        assert_eq!(locale.country(), "US");
        assert_eq!(locale.to_string(), "en_US");

        let root: Locale = "".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "");
    }

    #[test]
    fn test_fallback_parent() {
        let locale: Locale = "fr_CA".parse().unwrap();
        let parent = locale.fallback_parent().unwrap();
        assert_eq!(parent.to_string(), "fr");
        assert_eq!(parent.fallback_parent(), Some(Locale::root()));
        assert_eq!(Locale::root().fallback_parent(), None);
    }

    #[test]
    fn test_variant_without_country() {
        let locale: Locale = "en__POSIX".parse().unwrap();
        assert_eq!(locale.to_string(), "en__POSIX");
        assert_eq!(locale.fallback_parent().unwrap().to_string(), "en");
    }

    #[test]
    fn test_file_suffix() {
        assert_eq!("en_US".parse::<Locale>().unwrap().file_suffix(), "_en_US");
        assert_eq!(Locale::root().file_suffix(), "");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("en/US".parse::<Locale>().is_err());
        assert!("_US".parse::<Locale>().is_err());
    }

    #[test]
    fn test_unit_key_is_root() {
        assert!(().is_root());
        assert_eq!(().fallback_chain(), vec![()]);
    }

    #[test]
    fn test_serde_as_string() {
        let locale: Locale = serde_json::from_str(r#""de_AT""#).unwrap();
        assert_eq!(locale.country(), "AT");
        assert_eq!(serde_json::to_string(&locale).unwrap(), r#""de_AT""#);
    }
}
