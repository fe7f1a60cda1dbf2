//! Schema → predicate compiler.
//!
//! Walks a draft-4 schema node, turns each keyword into a boolean check in the
//! predicate algebra and folds the checks into one lambda per node. Nested
//! `properties` / `items` / `additionalProperties` schemas are compiled as
//! independent nodes and embedded as function calls.
//!
//! Keywords that only make sense for one instance type (e.g. `minLength`) are
//! placed according to the node's own `type`:
//! - no `type`: guarded on the runtime type ("soft" checks)
//! - matching `type`: emitted directly
//! - other `type`: dropped
pub mod context;
pub mod registry;
mod any;
mod array;
mod number;
mod object;
mod string;

use std::fmt;
use serde_json::{Map, Value};

use crate::eval::{EvalError, Evaluator};
use crate::reql::{self, Term, TypeTag, VarId};
use crate::schema::{DeclaredType, SchemaPath};

pub use context::Context;
use registry::Category;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("unsupported keyword `{keyword}` at {path}")]
    Unsupported { keyword: String, path: String },
    #[error("malformed `{keyword}` at {path}: {reason}")]
    Malformed { keyword: String, path: String, reason: String },
    #[error("schema at {path} must be an object, found {found}")]
    NotASchema { path: String, found: String },
}

/// How `multipleOf` tolerates floating-point rounding in the quotient.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MultipleOfPolicy {
    /// `floor(v / d) == v / d`
    #[default]
    Exact,
    /// `|q - floor(q + 0.5)| <= epsilon` where `q = v / d`
    Tolerance(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompileOptions {
    /// Wrap every check so a failure raises `"<path> <message>"` instead of
    /// evaluating to `false`.
    pub diagnostics: bool,
    pub multiple_of: MultipleOfPolicy,
}

/// A keyword's boolean test plus the message used in diagnostic mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub test: Term,
    pub message: String,
}

/// Compiled predicate: a one-parameter lambda over the document value.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    param: VarId,
    body: Term,
}

/// One schema node being compiled, as seen by keyword handlers.
pub struct Node<'a> {
    pub schema: &'a Map<String, Value>,
    pub path: &'a SchemaPath,
    pub var: VarId,
    pub declared: &'a DeclaredType,
}

/// Recursive descent driver. Holds nothing but options and the lambda
/// parameter counter, so every `compile` call is independent.
pub struct Compiler<'o> {
    options: &'o CompileOptions,
    next_var: u32,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

/// Compile `schema` with default options. `path` labels the root node
/// (normally `#`).
pub fn compile(schema: &Value, path: &str) -> Result<Predicate, CompileError> {
    compile_with(schema, path, &CompileOptions::default())
}

pub fn compile_with(schema: &Value, path: &str, options: &CompileOptions) -> Result<Predicate, CompileError> {
    Compiler::new(options).compile_node(schema, SchemaPath::new(path))
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CompileError {
    pub fn unsupported(keyword: &str, path: &SchemaPath) -> Self {
        Self::Unsupported { keyword: keyword.to_string(), path: path.to_string() }
    }

    pub fn malformed(keyword: &str, path: &SchemaPath, reason: impl Into<String>) -> Self {
        Self::Malformed { keyword: keyword.to_string(), path: path.to_string(), reason: reason.into() }
    }

    /// The offending keyword, if the failure is tied to one.
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::Unsupported { keyword, .. } | Self::Malformed { keyword, .. } => Some(keyword),
            Self::NotASchema { .. } => None,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Unsupported { path, .. } | Self::Malformed { path, .. } | Self::NotASchema { path, .. } => path,
        }
    }
}

impl Check {
    pub fn new(test: Term, message: impl Into<String>) -> Self {
        Self { test, message: message.into() }
    }
}

impl Predicate {
    pub fn param(&self) -> VarId {
        self.param
    }

    pub fn body(&self) -> &Term {
        &self.body
    }

    /// Accepts every document.
    pub fn is_trivial(&self) -> bool {
        self.body == reql::expr(true)
    }

    pub fn to_term(&self) -> Term {
        reql::func(self.param, self.body.clone())
    }

    /// `r.do(arg, predicate)`
    pub fn call(&self, arg: Term) -> Term {
        reql::call(self.to_term(), arg)
    }

    pub fn to_wire(&self) -> Value {
        self.to_term().to_wire()
    }

    /// Run the predicate against `doc` with the local evaluator.
    pub fn evaluate(&self, doc: &Value) -> Result<bool, EvalError> {
        match Evaluator::new().apply(&self.to_term(), vec![doc.clone()], "do")? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::Type { op: "predicate", expected: "BOOL", found: TypeTag::of(&other) }),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

impl Node<'_> {
    /// The document value this node validates.
    pub fn v(&self) -> Term {
        Term::Var(self.var)
    }

    /// Sibling keyword lookup.
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.schema.get(keyword)
    }
}

impl<'o> Compiler<'o> {
    pub fn new(options: &'o CompileOptions) -> Self {
        Self { options, next_var: 0 }
    }

    pub fn options(&self) -> &CompileOptions {
        self.options
    }

    pub fn fresh_var(&mut self) -> VarId {
        self.next_var += 1;
        VarId(self.next_var)
    }

    pub fn compile_node(&mut self, schema: &Value, path: SchemaPath) -> Result<Predicate, CompileError> {
        let Value::Object(map) = schema else {
            return Err(CompileError::NotASchema { path: path.to_string(), found: schema.to_string() });
        };

        // unknown keywords fail before anything else, whatever their siblings
        if let Some(keyword) = map.keys().find(|k| registry::lookup(k).is_none() && !registry::is_metadata(k)) {
            return Err(CompileError::unsupported(keyword, &path));
        }

        let declared = DeclaredType::parse(map, &path)?;
        let var = self.fresh_var();
        let node = Node { schema: map, path: &path, var, declared: &declared };
        let mut cx = Context::new(var, path.clone(), self.options.diagnostics);

        // `type` first, then the rest in document order
        let typed = map.iter().filter(|(k, _)| k.as_str() == "type");
        let rest = map.iter().filter(|(k, _)| k.as_str() != "type");
        for (keyword, arg) in typed.chain(rest) {
            if registry::is_metadata(keyword) {
                continue;
            }
            let handler = registry::lookup(keyword).ok_or_else(|| CompileError::unsupported(keyword, &path))?;
            let Some(check) = (handler.build)(self, &node, arg)? else {
                continue;
            };
            match handler.category {
                Category::Any => cx.require(check),
                Category::Typed(tag) => cx.place(tag, declared.placement(tag), check),
            }
        }

        Ok(Predicate { param: var, body: cx.finalize() })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ARGUMENT HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn count_arg(node: &Node<'_>, keyword: &str, arg: &Value) -> Result<u64, CompileError> {
    arg.as_u64().ok_or_else(|| {
        CompileError::malformed(keyword, node.path, format!("expected a non-negative integer, found {arg}"))
    })
}

fn number_arg(node: &Node<'_>, keyword: &str, arg: &Value) -> Result<f64, CompileError> {
    arg.as_f64().ok_or_else(|| {
        CompileError::malformed(keyword, node.path, format!("expected a number, found {arg}"))
    })
}

fn regex_arg(node: &Node<'_>, keyword: &str, pattern: &str) -> Result<(), CompileError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| CompileError::malformed(keyword, node.path, format!("invalid regex: {e}")))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(schema: Value, doc: Value) -> bool {
        compile(&schema, "#").unwrap().evaluate(&doc).unwrap()
    }

    fn diagnose(schema: Value, doc: Value) -> Result<bool, EvalError> {
        let options = CompileOptions { diagnostics: true, ..CompileOptions::default() };
        compile_with(&schema, "#", &options).unwrap().evaluate(&doc)
    }

    #[test]
    fn empty_schema_accepts_everything() {
        let p = compile(&json!({}), "#").unwrap();
        assert!(p.is_trivial());
        for doc in [json!(null), json!(1), json!("x"), json!([]), json!({})] {
            assert!(p.evaluate(&doc).unwrap());
        }
    }

    #[test]
    fn soft_checks_are_vacuous_off_type() {
        let schema = json!({"minLength": 3, "maximum": 2, "minItems": 1, "required": ["a"]});
        assert!(check(schema.clone(), json!(true)));
        assert!(check(schema.clone(), json!(null)));
        assert!(!check(schema.clone(), json!("ab")));
        assert!(!check(schema.clone(), json!(5)));
        assert!(!check(schema.clone(), json!([])));
        assert!(!check(schema, json!({"b": 1})));
    }

    #[test]
    fn soft_checks_share_one_guard_per_type() {
        let p = compile(&json!({"minLength": 1, "maxLength": 3}), "#").unwrap();
        let Term::Branch(test, then, otherwise) = p.body() else {
            panic!("expected a single guarded branch, got {p}");
        };
        assert_eq!(**test, Term::Var(p.param()).type_of().equals(TypeTag::String));
        assert!(matches!(&**then, Term::And(xs) if xs.len() == 2));
        assert_eq!(**otherwise, reql::expr(true));
    }

    #[test]
    fn matching_type_emits_checks_directly() {
        let p = compile(&json!({"type": "string", "minLength": 1}), "#").unwrap();
        let Term::And(xs) = p.body() else { panic!("expected a conjunction, got {p}") };
        assert_eq!(xs.len(), 2);
        assert!(!xs.iter().any(|x| matches!(x, Term::Branch(..))));
    }

    #[test]
    fn other_type_drops_checks() {
        let p = compile(&json!({"type": "string", "minimum": 5}), "#").unwrap();
        assert_eq!(*p.body(), Term::Var(p.param()).type_of().equals(TypeTag::String));
        assert!(check(json!({"type": "string", "minimum": 5}), json!("x")));
    }

    #[test]
    fn integer_requires_zero_fraction() {
        let schema = json!({"type": "integer"});
        assert!(check(schema.clone(), json!(1)));
        assert!(check(schema.clone(), json!(1.0)));
        assert!(check(schema.clone(), json!(-3)));
        assert!(!check(schema.clone(), json!(1.5)));
        assert!(!check(schema, json!("1")));
    }

    #[test]
    fn type_lists_are_disjunctions() {
        let schema = json!({"type": ["integer", "string"]});
        assert!(check(schema.clone(), json!(2)));
        assert!(check(schema.clone(), json!("x")));
        assert!(!check(schema.clone(), json!(2.5)));
        assert!(!check(schema, json!(null)));
    }

    #[test]
    fn type_list_keeps_soft_guards() {
        let schema = json!({"type": ["string", "null"], "minLength": 2});
        assert!(check(schema.clone(), json!(null)));
        assert!(check(schema.clone(), json!("ab")));
        assert!(!check(schema, json!("a")));
    }

    #[test]
    fn exclusive_minimum_is_strict() {
        let schema = json!({"minimum": 5, "exclusiveMinimum": true});
        assert!(!check(schema.clone(), json!(5)));
        assert!(check(schema, json!(6)));
        assert!(check(json!({"minimum": 5}), json!(5)));
        assert!(!check(json!({"maximum": 3, "exclusiveMaximum": true}), json!(3)));
        assert!(check(json!({"maximum": 3}), json!(3)));
    }

    #[test]
    fn exclusive_flags_alone_are_no_ops() {
        assert!(compile(&json!({"exclusiveMaximum": true}), "#").unwrap().is_trivial());
        let err = compile(&json!({"maximum": 1, "exclusiveMaximum": "yes"}), "#").unwrap_err();
        assert_eq!(err.keyword(), Some("exclusiveMaximum"));
    }

    #[test]
    fn multiple_of_uses_floor_of_quotient() {
        assert!(check(json!({"multipleOf": 0.5}), json!(1.5)));
        assert!(!check(json!({"multipleOf": 0.5}), json!(1.3)));
        assert!(check(json!({"multipleOf": 2}), json!(10)));
        assert!(!check(json!({"multipleOf": 2}), json!(7)));
    }

    #[test]
    fn multiple_of_tolerance_absorbs_rounding() {
        // 0.3 / 0.1 == 2.9999999999999996
        let schema = json!({"multipleOf": 0.1});
        assert!(!check(schema.clone(), json!(0.3)));

        let options = CompileOptions { multiple_of: MultipleOfPolicy::Tolerance(1e-9), ..CompileOptions::default() };
        let p = compile_with(&schema, "#", &options).unwrap();
        assert!(p.evaluate(&json!(0.3)).unwrap());
        assert!(!p.evaluate(&json!(0.31)).unwrap());
    }

    #[test]
    fn multiple_of_rejects_non_positive_divisors() {
        let err = compile(&json!({"multipleOf": 0}), "#").unwrap_err();
        assert!(matches!(err, CompileError::Malformed { ref keyword, .. } if keyword == "multipleOf"));
    }

    #[test]
    fn properties_only_check_present_fields() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        assert!(!check(schema.clone(), json!({"a": 1})));
        assert!(check(schema.clone(), json!({})));
        assert!(check(schema, json!({"a": "x", "b": 2})));
    }

    #[test]
    fn nested_properties_have_independent_contexts() {
        // the parent's `type` does not reach the child's soft checks
        let schema = json!({
            "type": "object",
            "properties": {"a": {"minLength": 2, "properties": {"b": {"maximum": 1}}}}
        });
        assert!(check(schema.clone(), json!({"a": 7})));
        assert!(!check(schema.clone(), json!({"a": "x"})));
        assert!(check(schema.clone(), json!({"a": {"b": 1}})));
        assert!(!check(schema, json!({"a": {"b": 2}})));
    }

    #[test]
    fn additional_properties_false() {
        let schema = json!({"type": "object", "properties": {"a": {}}, "additionalProperties": false});
        assert!(!check(schema.clone(), json!({"a": 1, "b": 2})));
        assert!(check(schema.clone(), json!({"a": 1})));
        assert!(check(schema, json!({})));
    }

    #[test]
    fn additional_properties_respects_pattern_properties() {
        let schema = json!({
            "properties": {"foo": {}},
            "patternProperties": {"^v": {}, "\\d$": {}},
            "additionalProperties": false
        });
        assert!(check(schema.clone(), json!({"foo": 1, "vroom": 2, "x1": 3})));
        assert!(!check(schema.clone(), json!({"foo": 1, "quux": 2})));
        assert!(check(schema, json!([1, 2])));
    }

    #[test]
    fn additional_properties_schema_validates_remaining_values() {
        let schema = json!({"properties": {"a": {}}, "additionalProperties": {"type": "boolean"}});
        assert!(check(schema.clone(), json!({"a": 1, "b": true})));
        assert!(!check(schema, json!({"a": 1, "b": "no"})));
    }

    #[test]
    fn permissive_additional_properties_compile_to_nothing() {
        assert!(compile(&json!({"additionalProperties": true}), "#").unwrap().is_trivial());
        assert!(compile(&json!({"additionalProperties": {}}), "#").unwrap().is_trivial());
    }

    #[test]
    fn standalone_pattern_properties_is_unsupported() {
        let err = compile(&json!({"patternProperties": {"^a": {"type": "string"}}}), "#").unwrap_err();
        assert_eq!(err.keyword(), Some("patternProperties"));
        let err = compile(
            &json!({"patternProperties": {"^a": {}}, "additionalProperties": true}),
            "#",
        ).unwrap_err();
        assert_eq!(err.keyword(), Some("patternProperties"));
    }

    #[test]
    fn unsupported_keywords_are_named() {
        for keyword in ["allOf", "anyOf", "oneOf", "not", "dependencies", "uniqueItems", "additionalItems", "format"] {
            let mut schema = json!({"type": "object", "minProperties": "bad"});
            schema[keyword] = json!([]);
            let err = compile(&schema, "#").unwrap_err();
            assert_eq!(
                err,
                CompileError::Unsupported { keyword: keyword.to_string(), path: "#".to_string() }
            );
        }
    }

    #[test]
    fn nested_unsupported_keywords_carry_their_path() {
        let err = compile(&json!({"properties": {"a": {"allOf": []}}}), "#").unwrap_err();
        assert_eq!(err.keyword(), Some("allOf"));
        assert_eq!(err.path(), "#/properties/a");
    }

    #[test]
    fn metadata_and_ref_are_ignored() {
        let schema = json!({"title": "t", "description": "d", "default": 3, "$ref": "#/x"});
        assert!(compile(&schema, "#").unwrap().is_trivial());
    }

    #[test]
    fn enum_matches_by_value() {
        let schema = json!({"enum": [1, "two", {"three": [3]}]});
        assert!(check(schema.clone(), json!(1.0)));
        assert!(check(schema.clone(), json!("two")));
        assert!(check(schema.clone(), json!({"three": [3]})));
        assert!(!check(schema, json!(2)));
    }

    #[test]
    fn required_fields() {
        let schema = json!({"required": ["a", "b"]});
        assert!(check(schema.clone(), json!({"a": 1, "b": 2})));
        assert!(!check(schema.clone(), json!({"a": 1})));
        assert!(check(schema, json!("not an object")));
    }

    #[test]
    fn null_valued_fields_count_as_present() {
        assert!(check(json!({"required": ["a"]}), json!({"a": null})));
        assert!(!check(json!({"required": ["a", "b"]}), json!({"a": null})));

        let schema = json!({"properties": {"a": {"type": "string"}}});
        assert!(!check(schema.clone(), json!({"a": null})));
        assert_eq!(
            diagnose(schema, json!({"a": null})),
            Err(EvalError::User("#/properties/a must be of type string".to_string()))
        );
    }

    #[test]
    fn presence_is_emitted_as_key_membership() {
        let p = compile(&json!({"type": "object", "required": ["a"]}), "#").unwrap();
        assert_eq!(
            p.to_string(),
            r#"lambda var_1: r.and_(var_1.type_of().eq("OBJECT"), var_1.keys().contains("a"))"#
        );
    }

    #[test]
    fn misshapen_arguments_are_malformed() {
        let cases = [
            (json!({"additionalProperties": 3}), "additionalProperties"),
            (json!({"patternProperties": [], "additionalProperties": false}), "patternProperties"),
            (json!({"patternProperties": {"(": {}}, "additionalProperties": false}), "patternProperties"),
            (json!({"minimum": "a"}), "minimum"),
            (json!({"maximum": null}), "maximum"),
            (json!({"properties": []}), "properties"),
            (json!({"items": 4}), "items"),
            (json!({"type": "float"}), "type"),
        ];
        for (schema, keyword) in cases {
            let err = compile(&schema, "#").unwrap_err();
            assert!(matches!(err, CompileError::Malformed { .. }), "{schema}: {err}");
            assert_eq!(err.keyword(), Some(keyword), "{schema}");
        }
    }

    #[test]
    fn string_keywords() {
        let schema = json!({"minLength": 2, "maxLength": 3, "pattern": "^a"});
        assert!(check(schema.clone(), json!("ab")));
        assert!(!check(schema.clone(), json!("ba")));
        assert!(!check(schema.clone(), json!("abcd")));
        assert!(check(json!({"maxLength": 2}), json!("ññ")));
        let err = compile(&json!({"pattern": "("}), "#").unwrap_err();
        assert_eq!(err.keyword(), Some("pattern"));
    }

    #[test]
    fn count_keywords() {
        assert!(!check(json!({"maxProperties": 1}), json!({"a": 1, "b": 2})));
        assert!(check(json!({"minProperties": 1}), json!({"a": 1})));
        assert!(!check(json!({"minItems": 2}), json!([1])));
        assert!(check(json!({"maxItems": 2}), json!([1, 2])));
        let err = compile(&json!({"maxItems": -1}), "#").unwrap_err();
        assert_eq!(err.keyword(), Some("maxItems"));
    }

    #[test]
    fn items_schema_applies_to_every_element() {
        let schema = json!({"items": {"type": "integer"}});
        assert!(check(schema.clone(), json!([1, 2, 3])));
        assert!(check(schema.clone(), json!([])));
        assert!(!check(schema.clone(), json!([1, "x"])));
        assert!(check(schema, json!({"not": "an array"})));
    }

    #[test]
    fn items_tuple_checks_present_positions() {
        let schema = json!({"items": [{"type": "integer"}, {"type": "string"}]});
        assert!(check(schema.clone(), json!([1, "a"])));
        assert!(check(schema.clone(), json!([1])));
        assert!(check(schema.clone(), json!([1, "a", null])));
        assert!(!check(schema, json!(["a", 1])));
    }

    #[test]
    fn non_object_schema_is_rejected() {
        let err = compile(&json!(true), "#").unwrap_err();
        assert!(matches!(err, CompileError::NotASchema { .. }));
        assert_eq!(err.keyword(), None);
    }

    #[test]
    fn diagnostics_raise_path_and_message() {
        let schema = json!({"properties": {"age": {"minimum": 0, "exclusiveMinimum": true}}});
        assert_eq!(
            diagnose(schema.clone(), json!({"age": 0})),
            Err(EvalError::User("#/properties/age must be greater than 0".to_string()))
        );
        assert_eq!(diagnose(schema, json!({"age": 1})), Ok(true));
        assert_eq!(
            diagnose(json!({"type": "integer"}), json!(1.5)),
            Err(EvalError::User("# must be an integer".to_string()))
        );
    }

    #[test]
    fn diagnostics_do_not_change_outcomes_for_valid_documents() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {"a": {"type": "array", "items": {"minimum": 1}}},
            "additionalProperties": false
        });
        assert_eq!(diagnose(schema.clone(), json!({"a": [1, 2]})), Ok(true));
        assert!(check(schema.clone(), json!({"a": [1, 2]})));
        assert_eq!(
            diagnose(schema, json!({"a": [1, 0]})),
            Err(EvalError::User("#/properties/a/items must be greater than or equal to 1".to_string()))
        );
    }

    #[test]
    fn compiling_twice_is_behaviourally_equivalent() {
        let schema = json!({"type": "object", "properties": {"n": {"multipleOf": 3}}, "maxProperties": 2});
        let a = compile(&schema, "#").unwrap();
        let b = compile(&schema, "#").unwrap();
        for doc in [json!({}), json!({"n": 3}), json!({"n": 4}), json!({"n": 3, "m": 1, "o": 2}), json!(7)] {
            assert_eq!(a.evaluate(&doc), b.evaluate(&doc));
        }
    }

    #[test]
    fn predicate_renders_as_lambda() {
        let p = compile(&json!({"type": "null"}), "#").unwrap();
        assert_eq!(p.to_string(), r#"lambda var_1: var_1.type_of().eq("NULL")"#);
        assert_eq!(p.to_wire(), json!([69, [[2, [1]], [17, [[52, [[10, [1]]]], "NULL"]]]]));
    }
}
