//! Schema node vocabulary: instance types, the node's declared `type`, and
//! the `#`-rooted path used to label diagnostics.
use std::fmt;
use serde_json::{Map, Value};

use crate::compile::CompileError;
use crate::reql::TypeTag;

// ————————————————————————————————————————————————————————————————————————————
// INSTANCE TYPES
// ————————————————————————————————————————————————————————————————————————————

/// JSON Schema primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceType {
    Array,
    Boolean,
    Integer,
    Number,
    Null,
    Object,
    String,
}

impl InstanceType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "array" => Some(Self::Array),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "null" => Some(Self::Null),
            "object" => Some(Self::Object),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Null => "null",
            Self::Object => "object",
            Self::String => "string",
        }
    }

    /// Runtime tag in the algebra. `integer` has no tag of its own.
    pub fn tag(self) -> TypeTag {
        match self {
            Self::Array => TypeTag::Array,
            Self::Boolean => TypeTag::Bool,
            Self::Integer | Self::Number => TypeTag::Number,
            Self::Null => TypeTag::Null,
            Self::Object => TypeTag::Object,
            Self::String => TypeTag::String,
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARED TYPE & PLACEMENT
// ————————————————————————————————————————————————————————————————————————————

/// What the node's own `type` keyword guarantees about the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    Absent,
    One(InstanceType),
    Many(Vec<InstanceType>),
}

/// Where a type-conditional check ends up in the node's conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// type already guaranteed; emit unguarded
    Direct,
    /// guard on the runtime type at finalization
    Soft,
    /// can never apply
    Drop,
}

impl DeclaredType {
    pub fn parse(node: &Map<String, Value>, path: &SchemaPath) -> Result<Self, CompileError> {
        let Some(arg) = node.get("type") else {
            return Ok(Self::Absent);
        };
        let lookup = |v: &Value| -> Result<InstanceType, CompileError> {
            v.as_str()
                .and_then(InstanceType::from_name)
                .ok_or_else(|| CompileError::malformed("type", path, format!("unknown type {v}")))
        };
        match arg {
            Value::String(_) => Ok(Self::One(lookup(arg)?)),
            Value::Array(xs) if !xs.is_empty() => {
                let types = xs.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Many(types))
            }
            other => Err(CompileError::malformed(
                "type",
                path,
                format!("expected a type name or a non-empty list of names, found {other}"),
            )),
        }
    }

    pub fn placement(&self, tag: TypeTag) -> Placement {
        match self {
            Self::Absent => Placement::Soft,
            Self::One(t) if t.tag() == tag => Placement::Direct,
            Self::One(_) => Placement::Drop,
            // still a union at runtime, so the guard stays
            Self::Many(ts) if ts.iter().any(|t| t.tag() == tag) => Placement::Soft,
            Self::Many(_) => Placement::Drop,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PATHS
// ————————————————————————————————————————————————————————————————————————————

/// JSON-pointer-like location of a schema node, e.g. `#/properties/address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPath(String);

impl SchemaPath {
    pub fn root() -> Self {
        Self("#".to_string())
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Append one pointer segment, escaping `~` and `/`.
    pub fn child(&self, segment: &str) -> Self {
        let escaped = segment.replace('~', "~0").replace('/', "~1");
        Self(format!("{}/{}", self.0, escaped))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SchemaPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared(schema: Value) -> DeclaredType {
        DeclaredType::parse(schema.as_object().unwrap(), &SchemaPath::root()).unwrap()
    }

    #[test]
    fn integer_shares_the_number_tag() {
        assert_eq!(InstanceType::Integer.tag(), TypeTag::Number);
        assert_eq!(InstanceType::Boolean.tag(), TypeTag::Bool);
        assert_eq!(InstanceType::from_name("any"), None);
    }

    #[test]
    fn placement_follows_declared_type() {
        let absent = declared(json!({}));
        assert_eq!(absent.placement(TypeTag::String), Placement::Soft);

        let string = declared(json!({"type": "string"}));
        assert_eq!(string.placement(TypeTag::String), Placement::Direct);
        assert_eq!(string.placement(TypeTag::Number), Placement::Drop);

        let integer = declared(json!({"type": "integer"}));
        assert_eq!(integer.placement(TypeTag::Number), Placement::Direct);

        let union = declared(json!({"type": ["string", "null"]}));
        assert_eq!(union.placement(TypeTag::String), Placement::Soft);
        assert_eq!(union.placement(TypeTag::Array), Placement::Drop);
    }

    #[test]
    fn unknown_type_names_are_malformed() {
        let node = json!({"type": "any"});
        let err = DeclaredType::parse(node.as_object().unwrap(), &SchemaPath::root()).unwrap_err();
        assert_eq!(err.keyword(), Some("type"));

        let node = json!({"type": []});
        assert!(DeclaredType::parse(node.as_object().unwrap(), &SchemaPath::root()).is_err());
    }

    #[test]
    fn child_paths_escape_pointer_characters() {
        let p = SchemaPath::root().child("properties").child("a/b~c");
        assert_eq!(p.as_str(), "#/properties/a~1b~0c");
    }
}
