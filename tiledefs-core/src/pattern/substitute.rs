//! Placeholder substitution
//!
//! Pattern templates refer to captured groups as `{0}` (the whole name),
//! `{1}`, `{2}` and so on. Placeholders without a matching group are left
//! as written.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::definition::{Attribute, AttributeValue, Definition, Expression};

/// Replace every `{N}` in `text` with `vars[N]`
pub fn replace_placeholders(text: &str, vars: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();

        let replacement = (digits > 0 && after[digits..].starts_with('}'))
            .then(|| after[..digits].parse::<usize>().ok())
            .flatten()
            .and_then(|index| vars.get(index));

        match replacement {
            Some(value) => {
                out.push_str(value);
                rest = &after[digits + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Build a concrete definition named `name` from a pattern template
///
/// The template is not touched; every string-valued field of the copy has
/// its placeholders replaced.
pub fn substitute_definition(template: &Definition, name: &str, vars: &[String]) -> Definition {
    let mut definition = template.clone();
    definition.name = Some(name.to_string());
    definition.resolved = false;

    definition.template = template
        .template
        .as_ref()
        .map(|attribute| substitute_attribute(attribute, vars));
    definition.extends = template
        .extends
        .as_deref()
        .map(|extends| replace_placeholders(extends, vars));
    definition.preparer = template
        .preparer
        .as_deref()
        .map(|preparer| replace_placeholders(preparer, vars));
    definition.roles = template.roles.as_ref().map(|roles| substitute_roles(roles, vars));
    definition.attributes = substitute_attributes(&template.attributes, vars);
    definition.cascaded_attributes = substitute_attributes(&template.cascaded_attributes, vars);

    definition
}

fn substitute_attributes(
    attributes: &IndexMap<String, Attribute>,
    vars: &[String],
) -> IndexMap<String, Attribute> {
    attributes
        .iter()
        .map(|(name, attribute)| (name.clone(), substitute_attribute(attribute, vars)))
        .collect()
}

fn substitute_roles(roles: &BTreeSet<String>, vars: &[String]) -> BTreeSet<String> {
    roles.iter().map(|role| replace_placeholders(role, vars)).collect()
}

fn substitute_attribute(attribute: &Attribute, vars: &[String]) -> Attribute {
    let value = attribute.value.as_ref().map(|value| match value {
        AttributeValue::Text(text) => AttributeValue::Text(replace_placeholders(text, vars)),
        AttributeValue::List(items) => AttributeValue::List(
            items.iter().map(|item| substitute_attribute(item, vars)).collect(),
        ),
        AttributeValue::Object(object) => AttributeValue::Object(object.clone()),
    });

    let expression = attribute.expression.as_ref().map(|expression| Expression {
        language: expression.language.clone(),
        expression: replace_placeholders(&expression.expression, vars),
    });

    Attribute {
        value,
        expression,
        roles: attribute.roles.as_ref().map(|roles| substitute_roles(roles, vars)),
        ..attribute.clone()
    }
}
