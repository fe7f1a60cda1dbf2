//! In-process evaluator for the predicate algebra.
//!
//! Models the query engine's semantics for the primitives in [`crate::reql`]
//! closely enough to run compiled predicates without a server:
//! - `and`/`or` short-circuit left to right, `branch` evaluates one arm
//! - numbers compare by value regardless of integer/float representation
//! - ordering across types follows type-name order
//! - `count` on strings counts Unicode scalar values
//! - `error` terms surface as [`EvalError::User`]
//! - `has_fields` treats a `null` value as a missing field
use std::cmp::Ordering;
use std::collections::HashMap;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::reql::{Term, TypeTag, VarId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// raised by an `error` term
    #[error("{0}")]
    User(String),
    #[error("{0}")]
    NonExistence(String),
    #[error("`{op}` expected type {expected} but found {found}")]
    Type { op: &'static str, expected: &'static str, found: TypeTag },
    #[error("invalid regex `{pattern}`: {message}")]
    Regex { pattern: String, message: String },
    #[error("variable `{0}` is not bound")]
    Unbound(VarId),
    #[error("`{op}` expects a function")]
    NotAFunction { op: &'static str },
    #[error("function takes {expected} argument(s) but was given {found}")]
    Arity { expected: usize, found: usize },
    #[error("cannot divide by zero")]
    DivideByZero,
    #[error("number {0} is not representable")]
    Number(f64),
}

/// Evaluate a closed term.
pub fn evaluate(term: &Term) -> Result<Value, EvalError> {
    Evaluator::new().eval(term)
}

#[derive(Debug, Default)]
pub struct Evaluator {
    scope: Vec<(VarId, Value)>,
    regexes: HashMap<String, Regex>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a function term to already-evaluated arguments.
    pub fn apply(&mut self, func: &Term, args: Vec<Value>, op: &'static str) -> Result<Value, EvalError> {
        let Term::Func { params, body } = func else {
            return Err(EvalError::NotAFunction { op });
        };
        if params.len() != args.len() {
            return Err(EvalError::Arity { expected: params.len(), found: args.len() });
        }
        let mark = self.scope.len();
        self.scope.extend(params.iter().copied().zip(args));
        let out = self.eval(body);
        self.scope.truncate(mark);
        out
    }

    pub fn eval(&mut self, term: &Term) -> Result<Value, EvalError> {
        match term {
            Term::Datum(v) => Ok(v.clone()),
            Term::Var(id) => self.scope.iter().rev()
                .find(|(k, _)| k == id)
                .map(|(_, v)| v.clone())
                .ok_or(EvalError::Unbound(*id)),
            Term::Func { .. } => Err(EvalError::NotAFunction { op: "datum" }),
            Term::Funcall { func, args } => {
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
                self.apply(func, args, "do")
            }

            Term::TypeOf(a) => {
                let v = self.eval(a)?;
                Ok(Value::from(TypeTag::of(&v).name()))
            }

            Term::Eq(a, b) => Ok(Value::Bool(datum_eq(&self.eval(a)?, &self.eval(b)?))),
            Term::Ne(a, b) => Ok(Value::Bool(!datum_eq(&self.eval(a)?, &self.eval(b)?))),
            Term::Lt(a, b) => self.compare(a, b, |o| o == Ordering::Less),
            Term::Le(a, b) => self.compare(a, b, |o| o != Ordering::Greater),
            Term::Gt(a, b) => self.compare(a, b, |o| o == Ordering::Greater),
            Term::Ge(a, b) => self.compare(a, b, |o| o != Ordering::Less),

            Term::Not(a) => Ok(Value::Bool(!truthy(&self.eval(a)?))),
            Term::And(xs) => {
                for x in xs {
                    if !truthy(&self.eval(x)?) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Term::Or(xs) => {
                for x in xs {
                    if truthy(&self.eval(x)?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }

            Term::Add(a, b) => {
                let (x, y) = (self.number(a, "add")?, self.number(b, "add")?);
                number(x + y)
            }
            Term::Sub(a, b) => {
                let (x, y) = (self.number(a, "sub")?, self.number(b, "sub")?);
                number(x - y)
            }
            Term::Div(a, b) => {
                let (x, y) = (self.number(a, "div")?, self.number(b, "div")?);
                if y == 0.0 {
                    return Err(EvalError::DivideByZero);
                }
                number(x / y)
            }
            Term::Floor(a) => number(self.number(a, "floor")?.floor()),

            Term::Count(a) => match self.eval(a)? {
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Array(xs) => Ok(Value::from(xs.len())),
                Value::Object(m) => Ok(Value::from(m.len())),
                other => Err(type_error("count", "SEQUENCE", &other)),
            },
            Term::Match(a, pattern) => {
                let s = match self.eval(a)? {
                    Value::String(s) => s,
                    other => return Err(type_error("match", "STRING", &other)),
                };
                let rx = self.regex(pattern)?;
                Ok(match_object(rx, &s))
            }
            Term::HasFields(a, fields) => {
                let obj = self.object(a, "has_fields")?;
                // a `null` value counts as missing, as in the engine
                let present = |f: &String| obj.get(f).is_some_and(|v| !v.is_null());
                Ok(Value::Bool(fields.iter().all(present)))
            }
            Term::Bracket(a, key) => {
                let obj = self.object(a, "bracket")?;
                let key = match self.eval(key)? {
                    Value::String(k) => k,
                    other => return Err(type_error("bracket", "STRING", &other)),
                };
                obj.get(&key)
                    .cloned()
                    .ok_or_else(|| EvalError::NonExistence(format!("no attribute `{key}`")))
            }
            Term::Nth(a, index) => {
                let xs = self.array(a, "nth")?;
                xs.get(*index)
                    .cloned()
                    .ok_or_else(|| EvalError::NonExistence(format!("index {index} out of bounds")))
            }
            Term::Keys(a) => {
                let obj = self.object(a, "keys")?;
                Ok(Value::Array(obj.keys().cloned().map(Value::from).collect()))
            }
            Term::SetDifference(a, b) => {
                let xs = self.array(a, "set_difference")?;
                let ys = self.array(b, "set_difference")?;
                let mut out: Vec<Value> = Vec::new();
                for x in xs {
                    let excluded = ys.iter().any(|y| datum_eq(&x, y));
                    let seen = out.iter().any(|o| datum_eq(&x, o));
                    if !excluded && !seen {
                        out.push(x);
                    }
                }
                Ok(Value::Array(out))
            }
            Term::Filter(a, f) => {
                let xs = self.array(a, "filter")?;
                let mut out = Vec::new();
                for x in xs {
                    if truthy(&self.apply(f, vec![x.clone()], "filter")?) {
                        out.push(x);
                    }
                }
                Ok(Value::Array(out))
            }
            Term::IsEmpty(a) => Ok(Value::Bool(self.array(a, "is_empty")?.is_empty())),
            Term::Contains(a, b) => {
                let xs = self.array(a, "contains")?;
                let needle = self.eval(b)?;
                Ok(Value::Bool(xs.iter().any(|x| datum_eq(x, &needle))))
            }

            Term::Branch(c, t, e) => {
                if truthy(&self.eval(c)?) { self.eval(t) } else { self.eval(e) }
            }
            Term::Error(message) => Err(EvalError::User(message.clone())),
        }
    }

    // ---- typed operand helpers ----

    fn compare(&mut self, a: &Term, b: &Term, accept: impl Fn(Ordering) -> bool) -> Result<Value, EvalError> {
        let (x, y) = (self.eval(a)?, self.eval(b)?);
        Ok(Value::Bool(accept(datum_cmp(&x, &y))))
    }

    fn number(&mut self, term: &Term, op: &'static str) -> Result<f64, EvalError> {
        match self.eval(term)? {
            Value::Number(n) => n.as_f64().ok_or(EvalError::Number(f64::NAN)),
            other => Err(type_error(op, "NUMBER", &other)),
        }
    }

    fn array(&mut self, term: &Term, op: &'static str) -> Result<Vec<Value>, EvalError> {
        match self.eval(term)? {
            Value::Array(xs) => Ok(xs),
            other => Err(type_error(op, "ARRAY", &other)),
        }
    }

    fn object(&mut self, term: &Term, op: &'static str) -> Result<Map<String, Value>, EvalError> {
        match self.eval(term)? {
            Value::Object(m) => Ok(m),
            other => Err(type_error(op, "OBJECT", &other)),
        }
    }

    fn regex(&mut self, pattern: &str) -> Result<&Regex, EvalError> {
        if !self.regexes.contains_key(pattern) {
            let rx = Regex::new(pattern).map_err(|e| EvalError::Regex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            self.regexes.insert(pattern.to_string(), rx);
        }
        Ok(&self.regexes[pattern])
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DATUM HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Everything except `false` and `null` is truthy.
pub fn truthy(v: &Value) -> bool {
    !matches!(v, Value::Bool(false) | Value::Null)
}

fn type_error(op: &'static str, expected: &'static str, found: &Value) -> EvalError {
    EvalError::Type { op, expected, found: TypeTag::of(found) }
}

fn number(x: f64) -> Result<Value, EvalError> {
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .ok_or(EvalError::Number(x))
}

fn as_f64(v: &serde_json::Number) -> OrderedFloat<f64> {
    OrderedFloat(v.as_f64().unwrap_or(f64::NAN))
}

/// Structural equality; `1` and `1.0` are the same number.
pub fn datum_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x) == as_f64(y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| datum_eq(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm.iter().all(|(k, x)| ym.get(k).is_some_and(|y| datum_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Total order over datums. Values of different types order by type name.
pub fn datum_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x).cmp(&as_f64(y)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Array(xs), Value::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys) {
                let o = datum_cmp(x, y);
                if o != Ordering::Equal {
                    return o;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Value::Object(xm), Value::Object(ym)) => {
            let mut xs: Vec<_> = xm.iter().collect();
            let mut ys: Vec<_> = ym.iter().collect();
            xs.sort_by(|p, q| p.0.cmp(q.0));
            ys.sort_by(|p, q| p.0.cmp(q.0));
            for ((xk, xv), (yk, yv)) in xs.iter().zip(&ys) {
                let o = xk.cmp(yk).then_with(|| datum_cmp(xv, yv));
                if o != Ordering::Equal {
                    return o;
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => TypeTag::of(a).name().cmp(TypeTag::of(b).name()),
    }
}

/// `null` when nothing matches, otherwise `{str, start, end, groups}` with
/// offsets counted in characters.
fn match_object(rx: &Regex, s: &str) -> Value {
    let Some(caps) = rx.captures(s) else {
        return Value::Null;
    };
    let span = |m: regex::Match<'_>| {
        let start = s[..m.start()].chars().count();
        json!({
            "str": m.as_str(),
            "start": start,
            "end": start + m.as_str().chars().count(),
        })
    };
    let groups = caps.iter().skip(1)
        .map(|g| g.map(span).unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    let mut whole = caps.get(0).map(span).unwrap_or(Value::Null);
    if let Value::Object(m) = &mut whole {
        m.insert("groups".to_string(), Value::Array(groups));
    }
    whole
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reql::{branch, call, error, expr, func};

    fn v1() -> Term { Term::Var(VarId(1)) }

    fn apply(body: Term, doc: Value) -> Result<Value, EvalError> {
        evaluate(&call(func(VarId(1), body), expr(doc)))
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(datum_eq(&json!(1), &json!(1.0)));
        assert!(datum_eq(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert_eq!(apply(v1().le(5u64), json!(5.0)), Ok(json!(true)));
        assert_eq!(apply(v1().gt(5u64), json!(5)), Ok(json!(false)));
    }

    #[test]
    fn mixed_types_order_by_type_name() {
        // ARRAY < BOOL < NULL < NUMBER < OBJECT < STRING
        assert_eq!(datum_cmp(&json!([]), &json!(true)), Ordering::Less);
        assert_eq!(datum_cmp(&json!("a"), &json!(9)), Ordering::Greater);
    }

    #[test]
    fn and_short_circuits_before_type_errors() {
        let body = crate::reql::and(vec![
            v1().type_of().equals("STRING"),
            v1().count().ge(2u64),
        ]);
        assert_eq!(apply(body.clone(), json!(12)), Ok(json!(false)));
        assert_eq!(apply(body, json!("ab")), Ok(json!(true)));
    }

    #[test]
    fn branch_only_evaluates_selected_arm() {
        let body = branch(v1().equals(1u64), true, error("boom"));
        assert_eq!(apply(body.clone(), json!(1)), Ok(json!(true)));
        assert_eq!(apply(body, json!(2)), Err(EvalError::User("boom".into())));
    }

    #[test]
    fn string_count_uses_characters() {
        assert_eq!(apply(v1().count(), json!("näïve")), Ok(json!(5)));
        assert!(matches!(
            apply(v1().count(), json!(true)),
            Err(EvalError::Type { op: "count", .. })
        ));
    }

    #[test]
    fn match_returns_null_or_match_object() {
        assert_eq!(apply(v1().match_regex("^a"), json!("bca")), Ok(Value::Null));
        let m = apply(v1().match_regex("(b)c"), json!("abc")).unwrap();
        assert_eq!(m["str"], json!("bc"));
        assert_eq!(m["start"], json!(1));
        assert_eq!(m["groups"][0]["str"], json!("b"));
        assert!(matches!(
            apply(v1().match_regex("("), json!("x")),
            Err(EvalError::Regex { .. })
        ));
    }

    #[test]
    fn sequences_and_objects() {
        let doc = json!({"a": 1, "b": 2, "c": 3});
        assert_eq!(apply(v1().keys(), doc.clone()), Ok(json!(["a", "b", "c"])));
        assert_eq!(
            apply(v1().keys().set_difference(expr(json!(["a", "c"]))), doc.clone()),
            Ok(json!(["b"]))
        );
        assert_eq!(apply(v1().has_fields(["a", "z"]), doc.clone()), Ok(json!(false)));
        assert_eq!(apply(v1().keys().contains("b"), doc.clone()), Ok(json!(true)));
        assert_eq!(apply(v1().bracket("b"), doc.clone()), Ok(json!(2)));
        assert!(matches!(apply(v1().bracket("z"), doc), Err(EvalError::NonExistence(_))));
        assert_eq!(apply(v1().nth(1), json!([4, 5])), Ok(json!(5)));
        assert_eq!(apply(expr(json!([1, "x"])).contains(v1()), json!(1.0)), Ok(json!(true)));
    }

    #[test]
    fn has_fields_treats_null_values_as_missing() {
        let doc = json!({"a": null, "b": 0});
        assert_eq!(apply(v1().has_fields(["b"]), doc.clone()), Ok(json!(true)));
        assert_eq!(apply(v1().has_fields(["a"]), doc.clone()), Ok(json!(false)));
        assert_eq!(apply(v1().keys().contains("a"), doc), Ok(json!(true)));
    }

    #[test]
    fn filter_binds_its_own_parameter() {
        let x = VarId(2);
        let evens = func(x, Term::Var(x).div(2u64).floor().equals(Term::Var(x).div(2u64)));
        assert_eq!(apply(v1().filter(evens), json!([1, 2, 3, 4])), Ok(json!([2, 4])));
    }

    #[test]
    fn arithmetic_errors() {
        assert_eq!(apply(v1().div(0u64), json!(3)), Err(EvalError::DivideByZero));
        assert_eq!(evaluate(&Term::Var(VarId(9))), Err(EvalError::Unbound(VarId(9))));
        assert_eq!(
            evaluate(&call(expr(1u64), expr(2u64))),
            Err(EvalError::NotAFunction { op: "do" })
        );
    }
}
