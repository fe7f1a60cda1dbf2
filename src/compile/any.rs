use serde_json::Value;

use crate::reql::{self, expr, Term, TypeTag};
use crate::schema::{DeclaredType, InstanceType};
use super::{Check, CompileError, Compiler, Node};

/// `integer` has no runtime tag: a number whose floor is itself.
pub(super) fn type_test(v: Term, ty: InstanceType) -> Term {
    match ty {
        InstanceType::Integer => reql::and(vec![
            v.clone().type_of().equals(TypeTag::Number),
            v.clone().floor().equals(v),
        ]),
        other => v.type_of().equals(other.tag()),
    }
}

pub(super) fn type_check(_: &mut Compiler<'_>, node: &Node<'_>, _arg: &Value) -> Result<Option<Check>, CompileError> {
    // the argument was already parsed into `node.declared`
    let check = match node.declared {
        DeclaredType::Absent => return Ok(None),
        DeclaredType::One(InstanceType::Integer) => {
            Check::new(type_test(node.v(), InstanceType::Integer), "must be an integer")
        }
        DeclaredType::One(ty) => Check::new(type_test(node.v(), *ty), format!("must be of type {ty}")),
        DeclaredType::Many(tys) => {
            let arms = tys.iter().map(|ty| type_test(node.v(), *ty)).collect();
            let names = tys.iter().map(|ty| ty.name()).collect::<Vec<_>>().join(", ");
            Check::new(reql::or(arms), format!("must be one of the types [{names}]"))
        }
    };
    Ok(Some(check))
}

pub(super) fn enum_check(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let values = match arg {
        Value::Array(xs) if !xs.is_empty() => xs,
        other => {
            return Err(CompileError::malformed("enum", node.path, format!("expected a non-empty array, found {other}")));
        }
    };
    let listed = values.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
    Ok(Some(Check::new(
        expr(arg.clone()).contains(node.v()),
        format!("must be equal to one of [{listed}]"),
    )))
}

/// `default`, `$ref`: accepted, nothing to check.
pub(super) fn no_op(_: &mut Compiler<'_>, _: &Node<'_>, _: &Value) -> Result<Option<Check>, CompileError> {
    Ok(None)
}
