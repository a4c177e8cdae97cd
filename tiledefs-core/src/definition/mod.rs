//! Definitions and their attributes
//!
//! A [`Definition`] is the unit the engine resolves: a template reference,
//! an optional parent, roles, a preparer and two attribute maps. Inheritance
//! is a field-wise merge: a child keeps every field it sets and takes the
//! rest from its fully resolved parent.

mod attribute;
mod model;

pub use attribute::{Attribute, AttributeValue, Expression, DEFINITION_RENDERER, TEMPLATE_RENDERER};
pub use model::{Definition, DefinitionMap};
