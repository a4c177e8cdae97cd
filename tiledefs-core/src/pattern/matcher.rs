//! Compiled definition patterns

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::definition::Definition;
use crate::error::{DefsError, Result};

use super::substitute::substitute_definition;

/// Pattern family, selected by a name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// `*` matches a run without `/`, `**` a run including `/`
    Wildcard,
    /// Regular expression that must match the whole name
    Regexp,
}

impl PatternKind {
    /// Name prefix that marks a definition as a pattern of this family
    pub fn prefix(&self) -> &'static str {
        match self {
            PatternKind::Wildcard => "WILDCARD:",
            PatternKind::Regexp => "REGEXP:",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Wildcard => write!(f, "wildcard"),
            PatternKind::Regexp => write!(f, "regexp"),
        }
    }
}

/// Translate a wildcard pattern into an anchored regular expression
///
/// Each `*` or `**` becomes one capturing group; `\` escapes the next
/// character.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("(.*)");
            }
            '*' => out.push_str("([^/]*)"),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}

/// A pattern and the template definition it synthesizes from
#[derive(Debug, Clone)]
pub struct DefinitionPatternMatcher {
    kind: PatternKind,
    pattern: String,
    regex: Regex,
    template: Definition,
}

impl DefinitionPatternMatcher {
    /// Compile `pattern` (without its family prefix)
    pub fn compile(kind: PatternKind, pattern: &str, template: Definition) -> Result<Self> {
        let source = match kind {
            PatternKind::Wildcard => wildcard_to_regex(pattern),
            PatternKind::Regexp => format!("^(?:{})$", pattern),
        };

        let regex = Regex::new(&source).map_err(|e| DefsError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            kind,
            pattern: pattern.to_string(),
            regex,
            template,
        })
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Template definition the matcher synthesizes from
    pub fn template(&self) -> &Definition {
        &self.template
    }

    /// Captured groups for `name`: group 0 is the whole name; unmatched
    /// optional groups are empty strings
    pub fn captures(&self, name: &str) -> Option<Vec<String>> {
        let captures = self.regex.captures(name)?;
        Some(
            captures
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    /// Synthesize a fresh definition for `name`, if it matches
    pub fn create_definition(&self, name: &str) -> Option<Definition> {
        let vars = self.captures(name)?;
        Some(substitute_definition(&self.template, name, &vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Attribute;

    #[test]
    fn test_single_star_stops_at_slash() {
        let matcher =
            DefinitionPatternMatcher::compile(PatternKind::Wildcard, "news/*", Definition::default())
                .unwrap();
        assert_eq!(
            matcher.captures("news/sports"),
            Some(vec!["news/sports".to_string(), "sports".to_string()])
        );
        assert!(matcher.captures("news/sports/today").is_none());
        assert!(matcher.captures("blog/sports").is_none());
    }

    #[test]
    fn test_double_star_crosses_slashes() {
        let matcher = DefinitionPatternMatcher::compile(
            PatternKind::Wildcard,
            "docs/**.page",
            Definition::default(),
        )
        .unwrap();
        let captures = matcher.captures("docs/a/b/c.page").unwrap();
        assert_eq!(captures[1], "a/b/c");
    }

    #[test]
    fn test_wildcard_escapes_and_literals() {
        assert_eq!(wildcard_to_regex("a.*"), r"^a\.([^/]*)$");
        assert_eq!(wildcard_to_regex(r"a\*b"), r"^a\*b$");

        let matcher =
            DefinitionPatternMatcher::compile(PatternKind::Wildcard, "a.*", Definition::default())
                .unwrap();
        assert!(matcher.captures("abc").is_none());
        assert!(matcher.captures("a.bc").is_some());
    }

    #[test]
    fn test_regexp_must_match_whole_name() {
        let matcher = DefinitionPatternMatcher::compile(
            PatternKind::Regexp,
            r"test\.(\w+)\.(\d+)",
            Definition::default(),
        )
        .unwrap();
        let captures = matcher.captures("test.page.42").unwrap();
        assert_eq!(captures, vec!["test.page.42", "page", "42"]);
        assert!(matcher.captures("xtest.page.42").is_none());
        assert!(matcher.captures("test.page.42x").is_none());
    }

    #[test]
    fn test_invalid_regexp_is_reported() {
        let err = DefinitionPatternMatcher::compile(PatternKind::Regexp, "(", Definition::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_create_definition_returns_fresh_copies() {
        let matcher = DefinitionPatternMatcher::compile(
            PatternKind::Wildcard,
            "news/*",
            Definition::new("WILDCARD:news/*")
                .with_attribute("body", Attribute::text("/news/{1}.jsp")),
        )
        .unwrap();

        let sports = matcher.create_definition("news/sports").unwrap();
        let weather = matcher.create_definition("news/weather").unwrap();
        assert_eq!(sports.attribute("body").and_then(Attribute::as_text), Some("/news/sports.jsp"));
        assert_eq!(weather.attribute("body").and_then(Attribute::as_text), Some("/news/weather.jsp"));
        assert_eq!(
            matcher.template().attribute("body").and_then(Attribute::as_text),
            Some("/news/{1}.jsp")
        );
        assert!(matcher.create_definition("blog/x").is_none());
    }
}
