use serde_json::Value;

use crate::reql::{self, func, Term};
use super::{count_arg, regex_arg, Check, CompileError, Compiler, Node, Predicate};

// ————————————————————————————————————————————————————————————————————————————
// COUNTS & PRESENCE
// ————————————————————————————————————————————————————————————————————————————

pub(super) fn max_properties(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let n = count_arg(node, "maxProperties", arg)?;
    Ok(Some(Check::new(node.v().count().le(n), format!("must not have more than {n} properties"))))
}

pub(super) fn min_properties(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let n = count_arg(node, "minProperties", arg)?;
    Ok(Some(Check::new(node.v().count().ge(n), format!("must have at least {n} properties"))))
}

pub(super) fn required(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let names = arg.as_array()
        .and_then(|xs| xs.iter().map(|x| x.as_str()).collect::<Option<Vec<_>>>())
        .ok_or_else(|| CompileError::malformed("required", node.path, format!("expected an array of strings, found {arg}")))?;
    if names.is_empty() {
        return Ok(None);
    }
    let message = format!("must have the required fields: {}", names.join(","));
    let present = names.iter().map(|name| has_key(node.v(), name)).collect();
    Ok(Some(Check::new(Term::and_all(present), message)))
}

/// Key presence regardless of value. `has_fields` would treat a `null` value
/// as missing.
fn has_key(object: Term, name: &str) -> Term {
    object.keys().contains(name)
}

// ————————————————————————————————————————————————————————————————————————————
// PROPERTIES
// ————————————————————————————————————————————————————————————————————————————

/// One `properties` entry: the field name and its independently compiled
/// predicate.
struct PropertyBranch {
    name: String,
    predicate: Predicate,
}

impl PropertyBranch {
    /// Present → the value must satisfy the predicate; absent → vacuously true.
    fn to_term(&self, object: &Term) -> Term {
        reql::branch(
            has_key(object.clone(), &self.name),
            self.predicate.call(object.clone().bracket(self.name.as_str())),
            true,
        )
    }
}

pub(super) fn properties(compiler: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let Some(fields) = arg.as_object() else {
        return Err(CompileError::malformed("properties", node.path, format!("expected an object, found {arg}")));
    };
    let base = node.path.child("properties");
    let mut branches = Vec::with_capacity(fields.len());
    for (name, sub_schema) in fields {
        let predicate = compiler.compile_node(sub_schema, base.child(name))?;
        if !predicate.is_trivial() {
            branches.push(PropertyBranch { name: name.clone(), predicate });
        }
    }
    if branches.is_empty() {
        return Ok(None);
    }
    let v = node.v();
    let test = Term::and_all(branches.iter().map(|b| b.to_term(&v)).collect());
    Ok(Some(Check::new(test, "properties must validate")))
}

// ————————————————————————————————————————————————————————————————————————————
// ADDITIONAL / PATTERN PROPERTIES
// ————————————————————————————————————————————————————————————————————————————

/// Field names not declared in `properties` and not matching any
/// `patternProperties` regex must be absent (`false`) or satisfy the schema.
pub(super) fn additional_properties(compiler: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let schema = match arg {
        Value::Bool(true) => return Ok(None),
        Value::Bool(false) => None,
        Value::Object(m) if m.is_empty() => return Ok(None),
        Value::Object(_) => {
            let predicate = compiler.compile_node(arg, node.path.child("additionalProperties"))?;
            if predicate.is_trivial() {
                return Ok(None);
            }
            Some(predicate)
        }
        other => {
            return Err(CompileError::malformed(
                "additionalProperties",
                node.path,
                format!("expected a boolean or a schema, found {other}"),
            ));
        }
    };

    let mut remaining = node.v().keys();
    if let Some(props) = node.get("properties") {
        let declared = props.as_object()
            .ok_or_else(|| CompileError::malformed("properties", node.path, format!("expected an object, found {props}")))?
            .keys()
            .cloned()
            .map(Value::from)
            .collect::<Vec<_>>();
        if !declared.is_empty() {
            remaining = remaining.set_difference(Value::Array(declared));
        }
    }
    if let Some(union) = pattern_union(node)? {
        let k = compiler.fresh_var();
        remaining = remaining.filter(func(k, Term::Var(k).match_regex(union).equals(Value::Null)));
    }

    let check = match schema {
        None => Check::new(remaining.is_empty(), "must not have additional properties"),
        Some(predicate) => {
            let k = compiler.fresh_var();
            let failing = func(k, !predicate.call(node.v().bracket(Term::Var(k))));
            Check::new(remaining.filter(failing).is_empty(), "additional properties must validate")
        }
    };
    Ok(Some(check))
}

/// Only meaningful as the exclusion set of a restricting
/// `additionalProperties`; on its own it would silently validate nothing.
pub(super) fn pattern_properties(_: &mut Compiler<'_>, node: &Node<'_>, _: &Value) -> Result<Option<Check>, CompileError> {
    if pattern_union(node)?.is_none() {
        return Ok(None);
    }
    match node.get("additionalProperties") {
        Some(Value::Bool(false)) => Ok(None),
        Some(Value::Object(m)) if !m.is_empty() => Ok(None),
        _ => Err(CompileError::unsupported("patternProperties", node.path)),
    }
}

/// All `patternProperties` regexes as one alternation, if there are any.
fn pattern_union(node: &Node<'_>) -> Result<Option<String>, CompileError> {
    let Some(arg) = node.get("patternProperties") else {
        return Ok(None);
    };
    let Some(patterns) = arg.as_object() else {
        return Err(CompileError::malformed("patternProperties", node.path, format!("expected an object, found {arg}")));
    };
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut alts = Vec::with_capacity(patterns.len());
    for p in patterns.keys() {
        regex_arg(node, "patternProperties", p)?;
        alts.push(format!("(?:{p})"));
    }
    Ok(Some(alts.join("|")))
}
