//! Keyword → handler table, built once on first use.
//!
//! A keyword missing from the table is unsupported; the driver fails closed on
//! it. That covers the combinators (`allOf`, `anyOf`, `oneOf`, `not`),
//! `dependencies`, `uniqueItems` and `additionalItems`.
use std::collections::HashMap;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::reql::TypeTag;
use super::{any, array, number, object, string};
use super::{Check, CompileError, Compiler, Node};

pub type Build = fn(&mut Compiler<'_>, &Node<'_>, &Value) -> Result<Option<Check>, CompileError>;

/// Which instance type a keyword constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Any,
    Typed(TypeTag),
}

#[derive(Clone, Copy)]
pub struct Handler {
    pub category: Category,
    pub build: Build,
}

/// Annotations with no validation meaning.
const METADATA: &[&str] = &["title", "description"];

static REGISTRY: Lazy<HashMap<&'static str, Handler>> = Lazy::new(|| {
    use Category::{Any, Typed};
    [
        // any instance type
        entry("type", Any, any::type_check),
        entry("enum", Any, any::enum_check),
        entry("default", Any, any::no_op),
        entry("$ref", Any, any::no_op),
        // string
        entry("maxLength", Typed(TypeTag::String), string::max_length),
        entry("minLength", Typed(TypeTag::String), string::min_length),
        entry("pattern", Typed(TypeTag::String), string::pattern),
        // number / integer
        entry("multipleOf", Typed(TypeTag::Number), number::multiple_of),
        entry("maximum", Typed(TypeTag::Number), number::maximum),
        entry("minimum", Typed(TypeTag::Number), number::minimum),
        entry("exclusiveMaximum", Typed(TypeTag::Number), number::exclusive_maximum),
        entry("exclusiveMinimum", Typed(TypeTag::Number), number::exclusive_minimum),
        // object
        entry("maxProperties", Typed(TypeTag::Object), object::max_properties),
        entry("minProperties", Typed(TypeTag::Object), object::min_properties),
        entry("required", Typed(TypeTag::Object), object::required),
        entry("properties", Typed(TypeTag::Object), object::properties),
        entry("additionalProperties", Typed(TypeTag::Object), object::additional_properties),
        entry("patternProperties", Typed(TypeTag::Object), object::pattern_properties),
        // array
        entry("maxItems", Typed(TypeTag::Array), array::max_items),
        entry("minItems", Typed(TypeTag::Array), array::min_items),
        entry("items", Typed(TypeTag::Array), array::items),
    ]
    .into_iter()
    .collect()
});

fn entry(keyword: &'static str, category: Category, build: Build) -> (&'static str, Handler) {
    (keyword, Handler { category, build })
}

pub fn lookup(keyword: &str) -> Option<&'static Handler> {
    REGISTRY.get(keyword)
}

pub fn is_metadata(keyword: &str) -> bool {
    METADATA.contains(&keyword)
}
