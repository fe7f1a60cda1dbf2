use serde_json::Value;

use super::{count_arg, regex_arg, Check, CompileError, Compiler, Node};

pub(super) fn max_length(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let n = count_arg(node, "maxLength", arg)?;
    Ok(Some(Check::new(node.v().count().le(n), format!("must have length at most {n}"))))
}

pub(super) fn min_length(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let n = count_arg(node, "minLength", arg)?;
    Ok(Some(Check::new(node.v().count().ge(n), format!("must have length at least {n}"))))
}

/// Unanchored search, like draft-4 `pattern`.
pub(super) fn pattern(_: &mut Compiler<'_>, node: &Node<'_>, arg: &Value) -> Result<Option<Check>, CompileError> {
    let Some(p) = arg.as_str() else {
        return Err(CompileError::malformed("pattern", node.path, format!("expected a string, found {arg}")));
    };
    regex_arg(node, "pattern", p)?;
    Ok(Some(Check::new(
        node.v().match_regex(p).not_equals(Value::Null),
        format!("must match the regex \"{p}\""),
    )))
}
