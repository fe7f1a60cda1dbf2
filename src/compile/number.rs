use serde_json::Value;

use crate::reql;
use super::{number_arg, Check, CompileError, Compiler, MultipleOfPolicy, Node};

/// Divide and compare the quotient with its floor; unlike a modulus this works
/// for fractional divisors and dividends.
pub(super) fn multiple_of(compiler: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let d = number_arg(node, "multipleOf", arg)?;
    if d <= 0.0 {
        return Err(CompileError::malformed("multipleOf", node.path, format!("must be greater than 0, found {arg}")));
    }
    let q = node.v().div(arg.clone());
    let test = match compiler.options().multiple_of {
        MultipleOfPolicy::Exact => q.clone().floor().equals(q),
        MultipleOfPolicy::Tolerance(eps) => {
            let diff = q.clone().sub(q.add(0.5).floor());
            reql::and(vec![diff.clone().le(eps), diff.ge(-eps)])
        }
    };
    Ok(Some(Check::new(test, format!("must be a multiple of {arg}"))))
}

pub(super) fn maximum(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    number_arg(node, "maximum", arg)?;
    let check = if is_exclusive(node, "exclusiveMaximum")? {
        Check::new(node.v().lt(arg.clone()), format!("must be less than {arg}"))
    } else {
        Check::new(node.v().le(arg.clone()), format!("must be less than or equal to {arg}"))
    };
    Ok(Some(check))
}

pub(super) fn minimum(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    number_arg(node, "minimum", arg)?;
    let check = if is_exclusive(node, "exclusiveMinimum")? {
        Check::new(node.v().gt(arg.clone()), format!("must be greater than {arg}"))
    } else {
        Check::new(node.v().ge(arg.clone()), format!("must be greater than or equal to {arg}"))
    };
    Ok(Some(check))
}

/// `exclusiveMaximum` / `exclusiveMinimum` only modify their bound.
pub(super) fn exclusive_maximum(_: &mut Compiler<'_>, node: &Node<'_>, _: &Value) -> Result<Option<Check>, CompileError> {
    is_exclusive(node, "exclusiveMaximum")?;
    Ok(None)
}

pub(super) fn exclusive_minimum(_: &mut Compiler<'_>, node: &Node<'_>, _: &Value) -> Result<Option<Check>, CompileError> {
    is_exclusive(node, "exclusiveMinimum")?;
    Ok(None)
}

fn is_exclusive(node: &Node<'_>, keyword: &str) -> Result<bool, CompileError> {
    match node.get(keyword) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(CompileError::malformed(keyword, node.path, format!("expected a boolean, found {other}"))),
    }
}
