//! Attributes carried by definitions
//!
//! An attribute is a value (or an unevaluated expression) plus the metadata a
//! renderer needs: a renderer name and the roles allowed to see it. The
//! renderer name is opaque here; the presentation layer maps it to a render
//! capability.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Renderer name for template paths
pub const TEMPLATE_RENDERER: &str = "template";
/// Renderer name for nested definitions
pub const DEFINITION_RENDERER: &str = "definition";

/// An unevaluated expression, kept verbatim for the host's evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    /// Expression language (e.g. "EL", "OGNL"); `None` means the host default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Expression text
    pub expression: String,
}

impl Expression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            language: None,
            expression: expression.into(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// The value held by an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Plain text: template paths, definition names, literal strings
    Text(String),
    /// Ordered list of nested attributes
    List(Vec<Attribute>),
    /// Any other JSON value, passed through untouched
    Object(Value),
}

impl AttributeValue {
    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// List items, if this is a list value
    pub fn as_list(&self) -> Option<&[Attribute]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self {
        AttributeValue::Text(text.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(text: String) -> Self {
        AttributeValue::Text(text)
    }
}

/// A single named value within a definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttributeRepr")]
pub struct Attribute {
    /// The value; takes precedence over `expression` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeValue>,

    /// Expression evaluated by the host when `value` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,

    /// Renderer name ("string", "template", "definition", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,

    /// Roles allowed to render this attribute; `None` or empty means everyone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>,

    /// For list values: prepend the parent's items when inheriting
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inherit: bool,
}

/// Serde input form: a bare string is shorthand for a text attribute
#[derive(Deserialize)]
#[serde(untagged)]
enum AttributeRepr {
    Short(String),
    Full {
        #[serde(default)]
        value: Option<AttributeValue>,
        #[serde(default)]
        expression: Option<Expression>,
        #[serde(default)]
        renderer: Option<String>,
        #[serde(default)]
        roles: Option<BTreeSet<String>>,
        #[serde(default)]
        inherit: bool,
    },
}

impl From<AttributeRepr> for Attribute {
    fn from(repr: AttributeRepr) -> Self {
        match repr {
            AttributeRepr::Short(text) => Attribute::text(text),
            AttributeRepr::Full {
                value,
                expression,
                renderer,
                roles,
                inherit,
            } => Attribute {
                value,
                expression,
                renderer,
                roles,
                inherit,
            },
        }
    }
}

impl Attribute {
    /// Text attribute without a renderer
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(AttributeValue::Text(value.into())),
            ..Default::default()
        }
    }

    /// Template attribute (renderer "template")
    pub fn template(path: impl Into<String>) -> Self {
        Self::text(path).with_renderer(TEMPLATE_RENDERER)
    }

    /// Attribute that renders another definition by name
    pub fn definition(name: impl Into<String>) -> Self {
        Self::text(name).with_renderer(DEFINITION_RENDERER)
    }

    /// Attribute holding only an expression
    pub fn expression(expression: Expression) -> Self {
        Self {
            expression: Some(expression),
            ..Default::default()
        }
    }

    /// List attribute
    pub fn list(items: Vec<Attribute>) -> Self {
        Self {
            value: Some(AttributeValue::List(items)),
            ..Default::default()
        }
    }

    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.get_or_insert_with(BTreeSet::new).insert(role.into());
        self
    }

    pub fn with_inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// True when neither a value nor an expression is present
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.expression.is_none()
    }

    /// Text value, if any
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_ref().and_then(AttributeValue::as_text)
    }

    /// Fills every unset field from `parent`
    ///
    /// Value and expression travel together: both are taken from the parent
    /// only when this attribute has no value. An inheriting list keeps its
    /// own items after the parent's.
    pub fn inherit(&mut self, parent: &Attribute) {
        if self.value.is_none() {
            self.value = parent.value.clone();
            if self.expression.is_none() {
                self.expression = parent.expression.clone();
            }
        } else if self.inherit {
            if let (Some(AttributeValue::List(items)), Some(AttributeValue::List(parent_items))) =
                (self.value.as_mut(), parent.value.as_ref())
            {
                items.splice(0..0, parent_items.iter().cloned());
            }
        }

        if self.roles.as_ref().map_or(true, BTreeSet::is_empty) {
            if let Some(roles) = &parent.roles {
                self.roles = Some(roles.clone());
            }
        }

        if self.renderer.is_none() {
            self.renderer = parent.renderer.clone();
        }
    }
}
