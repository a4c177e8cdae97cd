//! Definition records

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::attribute::Attribute;

/// Definitions by name, in registration order
pub type DefinitionMap = IndexMap<String, Definition>;

/// A named, inheritable layout record
///
/// A definition names a template, optionally a parent to inherit from, the
/// roles allowed to render it, a preparer hook and its attributes. Local
/// attributes apply to this definition only; cascaded attributes propagate
/// to nested renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    /// Unique name within a customization key; absent for embedded definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Template reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Attribute>,

    /// Name of the parent definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Roles permitted to render this definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>,

    /// Preparer hook name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preparer: Option<String>,

    /// Local attributes
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Attribute>,

    /// Attributes propagated to nested renders
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub cascaded_attributes: IndexMap<String, Attribute>,

    /// Set once the parent chain has been merged in
    #[serde(skip)]
    pub(crate) resolved: bool,
}

impl Definition {
    /// Create an empty named definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Create an unnamed definition
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, path: impl Into<String>) -> Self {
        self.template = Some(Attribute::template(path));
        self
    }

    pub fn with_template_attribute(mut self, template: Attribute) -> Self {
        self.template = Some(template);
        self
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.get_or_insert_with(BTreeSet::new).insert(role.into());
        self
    }

    pub fn with_preparer(mut self, preparer: impl Into<String>) -> Self {
        self.preparer = Some(preparer.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_cascaded_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.cascaded_attributes.insert(name.into(), attribute);
        self
    }

    /// Name used in diagnostics
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Whether this definition names a parent
    pub fn is_extending(&self) -> bool {
        self.extends.is_some()
    }

    /// Whether the parent chain has already been merged in
    pub fn is_resolved(&self) -> bool {
        self.resolved || self.extends.is_none()
    }

    /// Template path, if the template is a text attribute
    pub fn template_path(&self) -> Option<&str> {
        self.template.as_ref().and_then(Attribute::as_text)
    }

    /// Local attribute first, then cascaded
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .get(name)
            .or_else(|| self.cascaded_attributes.get(name))
    }

    /// Local and cascaded attributes, local first
    pub fn all_attributes(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter().chain(self.cascaded_attributes.iter())
    }

    /// Merge a fully resolved parent into this definition
    ///
    /// Only fields this definition leaves unset are filled in. A parent
    /// attribute is copied when this definition has no attribute of that
    /// name at either level; same-named attributes merge field-wise.
    pub fn inherit(&mut self, parent: &Definition) {
        inherit_attributes(
            &mut self.cascaded_attributes,
            &self.attributes,
            &parent.cascaded_attributes,
        );
        inherit_attributes(
            &mut self.attributes,
            &self.cascaded_attributes,
            &parent.attributes,
        );

        if let Some(template) = &parent.template {
            if let Some(own) = self.template.as_mut() {
                own.inherit(template);
            } else {
                self.template = Some(template.clone());
            }
        }

        if self.roles.as_ref().map_or(true, BTreeSet::is_empty) {
            if let Some(roles) = &parent.roles {
                self.roles = Some(roles.clone());
            }
        }

        if self.preparer.is_none() {
            self.preparer = parent.preparer.clone();
        }
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.resolved = true;
    }
}

fn inherit_attributes(
    target: &mut IndexMap<String, Attribute>,
    other_level: &IndexMap<String, Attribute>,
    parent: &IndexMap<String, Attribute>,
) {
    for (name, parent_attribute) in parent {
        match target.get_mut(name) {
            Some(own) => own.inherit(parent_attribute),
            None if !other_level.contains_key(name) => {
                target.insert(name.clone(), parent_attribute.clone());
            }
            None => {}
        }
    }
}
