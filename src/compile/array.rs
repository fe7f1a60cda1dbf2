use serde_json::Value;

use crate::reql::{self, func, Term};
use super::{count_arg, Check, CompileError, Compiler, Node};

pub(super) fn max_items(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let n = count_arg(node, "maxItems", arg)?;
    Ok(Some(Check::new(node.v().count().le(n), format!("must have at most {n} items"))))
}

pub(super) fn min_items(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let n = count_arg(node, "minItems", arg)?;
    Ok(Some(Check::new(node.v().count().ge(n), format!("must have at least {n} items"))))
}

/// A schema applies to every element; a list of schemas applies by position
/// to the elements that exist.
pub(super) fn items(compiler: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let base = node.path.child("items");
    match arg {
        Value::Object(_) => {
            let predicate = compiler.compile_node(arg, base)?;
            if predicate.is_trivial() {
                return Ok(None);
            }
            let x = compiler.fresh_var();
            let failing = func(x, !predicate.call(Term::Var(x)));
            Ok(Some(Check::new(node.v().filter(failing).is_empty(), "items must validate")))
        }
        Value::Array(schemas) => {
            let mut positions = Vec::new();
            for (i, sub_schema) in schemas.iter().enumerate() {
                let predicate = compiler.compile_node(sub_schema, base.child(&i.to_string()))?;
                if predicate.is_trivial() {
                    continue;
                }
                positions.push(reql::branch(
                    node.v().count().gt(i),
                    predicate.call(node.v().nth(i)),
                    true,
                ));
            }
            if positions.is_empty() {
                return Ok(None);
            }
            Ok(Some(Check::new(Term::and_all(positions), "items must validate")))
        }
        other => Err(CompileError::malformed("items", node.path, format!("expected a schema or an array of schemas, found {other}"))),
    }
}
