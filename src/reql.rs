//! Predicate algebra: a small owned ReQL expression tree.
//!
//! Only the primitives the schema compiler emits are modelled. Terms are built
//! with a fluent API that reads like the Python driver
//! (`v.type_of().equals("STRING")`) and can be rendered two ways:
//! - `Display`: driver-style text, for humans and the CLI
//! - `to_wire`: the JSON term protocol (`[term_type, [args...]]`)
use std::fmt;
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Runtime type tags reported by `type_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Array,
    Bool,
    Null,
    Number,
    Object,
    String,
}

/// Lambda parameter identifier, rendered as `var_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Datum(Value),
    Var(VarId),
    Func { params: Vec<VarId>, body: Box<Term> },
    Funcall { func: Box<Term>, args: Vec<Term> },

    TypeOf(Box<Term>),

    // comparisons
    Eq(Box<Term>, Box<Term>),
    Ne(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),

    // logic
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),

    // arithmetic
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Div(Box<Term>, Box<Term>),
    Floor(Box<Term>),

    // strings / sequences / objects
    Count(Box<Term>),
    Match(Box<Term>, String),
    HasFields(Box<Term>, Vec<String>),
    Bracket(Box<Term>, Box<Term>),
    Nth(Box<Term>, usize),
    Keys(Box<Term>),
    SetDifference(Box<Term>, Box<Term>),
    Filter(Box<Term>, Box<Term>),
    IsEmpty(Box<Term>),
    Contains(Box<Term>, Box<Term>),

    // control
    Branch(Box<Term>, Box<Term>, Box<Term>),
    Error(String),
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

/// Lift a literal into the algebra (`r.expr`).
pub fn expr(value: impl Into<Value>) -> Term {
    Term::Datum(value.into())
}

pub fn and(terms: Vec<Term>) -> Term {
    Term::And(terms)
}

pub fn or(terms: Vec<Term>) -> Term {
    Term::Or(terms)
}

pub fn branch(test: Term, then: impl Into<Term>, otherwise: impl Into<Term>) -> Term {
    Term::Branch(Box::new(test), Box::new(then.into()), Box::new(otherwise.into()))
}

pub fn error(message: impl Into<String>) -> Term {
    Term::Error(message.into())
}

/// Single-parameter lambda.
pub fn func(param: VarId, body: Term) -> Term {
    Term::Func { params: vec![param], body: Box::new(body) }
}

/// Apply a single-parameter lambda (`r.do(arg, func)`).
pub fn call(func: Term, arg: Term) -> Term {
    Term::Funcall { func: Box::new(func), args: vec![arg] }
}

impl Term {
    /// Reduce a list of boolean terms to one conjunction.
    /// The empty list is the constant `true`.
    pub fn and_all(mut terms: Vec<Term>) -> Term {
        match terms.len() {
            0 => expr(true),
            1 => terms.remove(0),
            _ => Term::And(terms),
        }
    }

    pub fn type_of(self) -> Term { Term::TypeOf(Box::new(self)) }
    pub fn equals(self, rhs: impl Into<Term>) -> Term { Term::Eq(Box::new(self), Box::new(rhs.into())) }
    pub fn not_equals(self, rhs: impl Into<Term>) -> Term { Term::Ne(Box::new(self), Box::new(rhs.into())) }
    pub fn lt(self, rhs: impl Into<Term>) -> Term { Term::Lt(Box::new(self), Box::new(rhs.into())) }
    pub fn le(self, rhs: impl Into<Term>) -> Term { Term::Le(Box::new(self), Box::new(rhs.into())) }
    pub fn gt(self, rhs: impl Into<Term>) -> Term { Term::Gt(Box::new(self), Box::new(rhs.into())) }
    pub fn ge(self, rhs: impl Into<Term>) -> Term { Term::Ge(Box::new(self), Box::new(rhs.into())) }
    pub fn add(self, rhs: impl Into<Term>) -> Term { Term::Add(Box::new(self), Box::new(rhs.into())) }
    pub fn sub(self, rhs: impl Into<Term>) -> Term { Term::Sub(Box::new(self), Box::new(rhs.into())) }
    pub fn div(self, rhs: impl Into<Term>) -> Term { Term::Div(Box::new(self), Box::new(rhs.into())) }
    pub fn floor(self) -> Term { Term::Floor(Box::new(self)) }
    pub fn count(self) -> Term { Term::Count(Box::new(self)) }
    pub fn keys(self) -> Term { Term::Keys(Box::new(self)) }
    pub fn is_empty(self) -> Term { Term::IsEmpty(Box::new(self)) }
    pub fn nth(self, index: usize) -> Term { Term::Nth(Box::new(self), index) }

    pub fn match_regex(self, pattern: impl Into<String>) -> Term {
        Term::Match(Box::new(self), pattern.into())
    }

    pub fn has_fields<I, S>(self, fields: I) -> Term
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Term::HasFields(Box::new(self), fields.into_iter().map(Into::into).collect())
    }

    /// Field access (`v[key]`); the key may itself be a term.
    pub fn bracket(self, key: impl Into<Term>) -> Term {
        Term::Bracket(Box::new(self), Box::new(key.into()))
    }

    pub fn set_difference(self, rhs: impl Into<Term>) -> Term {
        Term::SetDifference(Box::new(self), Box::new(rhs.into()))
    }

    pub fn filter(self, predicate: Term) -> Term {
        Term::Filter(Box::new(self), Box::new(predicate))
    }

    pub fn contains(self, value: impl Into<Term>) -> Term {
        Term::Contains(Box::new(self), Box::new(value.into()))
    }
}

impl std::ops::Not for Term {
    type Output = Term;
    fn not(self) -> Term { Term::Not(Box::new(self)) }
}

impl From<Value> for Term { fn from(v: Value) -> Self { Term::Datum(v) } }
impl From<bool> for Term { fn from(v: bool) -> Self { expr(v) } }
impl From<f64> for Term { fn from(v: f64) -> Self { expr(v) } }
impl From<u64> for Term { fn from(v: u64) -> Self { expr(v) } }
impl From<usize> for Term { fn from(v: usize) -> Self { expr(v) } }
impl From<&str> for Term { fn from(v: &str) -> Self { expr(v) } }
impl From<String> for Term { fn from(v: String) -> Self { expr(v) } }
impl From<VarId> for Term { fn from(v: VarId) -> Self { Term::Var(v) } }
impl From<TypeTag> for Term { fn from(v: TypeTag) -> Self { expr(v.name()) } }

// ————————————————————————————————————————————————————————————————————————————
// TYPE TAGS
// ————————————————————————————————————————————————————————————————————————————

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Array => "ARRAY",
            TypeTag::Bool => "BOOL",
            TypeTag::Null => "NULL",
            TypeTag::Number => "NUMBER",
            TypeTag::Object => "OBJECT",
            TypeTag::String => "STRING",
        }
    }

    pub fn of(value: &Value) -> TypeTag {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var_{}", self.0)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// WIRE FORMAT
// ————————————————————————————————————————————————————————————————————————————

/// Term type codes from the ReQL protocol definition.
mod code {
    pub const MAKE_ARRAY: u64 = 2;
    pub const VAR: u64 = 10;
    pub const ERROR: u64 = 12;
    pub const EQ: u64 = 17;
    pub const NE: u64 = 18;
    pub const LT: u64 = 19;
    pub const LE: u64 = 20;
    pub const GT: u64 = 21;
    pub const GE: u64 = 22;
    pub const NOT: u64 = 23;
    pub const ADD: u64 = 24;
    pub const SUB: u64 = 25;
    pub const DIV: u64 = 27;
    pub const HAS_FIELDS: u64 = 32;
    pub const FILTER: u64 = 39;
    pub const COUNT: u64 = 43;
    pub const NTH: u64 = 45;
    pub const TYPE_OF: u64 = 52;
    pub const FUNCALL: u64 = 64;
    pub const BRANCH: u64 = 65;
    pub const OR: u64 = 66;
    pub const AND: u64 = 67;
    pub const FUNC: u64 = 69;
    pub const IS_EMPTY: u64 = 86;
    pub const SET_DIFFERENCE: u64 = 91;
    pub const CONTAINS: u64 = 93;
    pub const KEYS: u64 = 94;
    pub const MATCH: u64 = 97;
    pub const BRACKET: u64 = 170;
    pub const FLOOR: u64 = 183;
}

fn wire(code: u64, args: Vec<Value>) -> Value {
    Value::Array(vec![Value::from(code), Value::Array(args)])
}

fn unary(code: u64, a: &Term) -> Value {
    wire(code, vec![a.to_wire()])
}

fn binary(code: u64, a: &Term, b: &Term) -> Value {
    wire(code, vec![a.to_wire(), b.to_wire()])
}

fn wire_datum(value: &Value) -> Value {
    match value {
        Value::Array(xs) => wire(code::MAKE_ARRAY, xs.iter().map(wire_datum).collect()),
        Value::Object(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), wire_datum(v))).collect(),
        ),
        scalar => scalar.clone(),
    }
}

impl Term {
    /// Encode as the JSON term protocol accepted by the query engine.
    pub fn to_wire(&self) -> Value {
        match self {
            Term::Datum(v) => wire_datum(v),
            Term::Var(id) => wire(code::VAR, vec![Value::from(id.0)]),
            Term::Func { params, body } => {
                let params = params.iter().map(|p| Value::from(p.0)).collect();
                wire(code::FUNC, vec![wire(code::MAKE_ARRAY, params), body.to_wire()])
            }
            Term::Funcall { func, args } => {
                let mut xs = vec![func.to_wire()];
                xs.extend(args.iter().map(Term::to_wire));
                wire(code::FUNCALL, xs)
            }
            Term::TypeOf(a) => unary(code::TYPE_OF, a),
            Term::Eq(a, b) => binary(code::EQ, a, b),
            Term::Ne(a, b) => binary(code::NE, a, b),
            Term::Lt(a, b) => binary(code::LT, a, b),
            Term::Le(a, b) => binary(code::LE, a, b),
            Term::Gt(a, b) => binary(code::GT, a, b),
            Term::Ge(a, b) => binary(code::GE, a, b),
            Term::Not(a) => unary(code::NOT, a),
            Term::And(xs) => wire(code::AND, xs.iter().map(Term::to_wire).collect()),
            Term::Or(xs) => wire(code::OR, xs.iter().map(Term::to_wire).collect()),
            Term::Add(a, b) => binary(code::ADD, a, b),
            Term::Sub(a, b) => binary(code::SUB, a, b),
            Term::Div(a, b) => binary(code::DIV, a, b),
            Term::Floor(a) => unary(code::FLOOR, a),
            Term::Count(a) => unary(code::COUNT, a),
            Term::Match(a, pattern) => wire(code::MATCH, vec![a.to_wire(), Value::from(pattern.as_str())]),
            Term::HasFields(a, fields) => {
                let mut xs = vec![a.to_wire()];
                xs.extend(fields.iter().map(|f| Value::from(f.as_str())));
                wire(code::HAS_FIELDS, xs)
            }
            Term::Bracket(a, key) => binary(code::BRACKET, a, key),
            Term::Nth(a, index) => wire(code::NTH, vec![a.to_wire(), Value::from(*index)]),
            Term::Keys(a) => unary(code::KEYS, a),
            Term::SetDifference(a, b) => binary(code::SET_DIFFERENCE, a, b),
            Term::Filter(a, f) => binary(code::FILTER, a, f),
            Term::IsEmpty(a) => unary(code::IS_EMPTY, a),
            Term::Contains(a, b) => binary(code::CONTAINS, a, b),
            Term::Branch(c, t, e) => wire(code::BRANCH, vec![c.to_wire(), t.to_wire(), e.to_wire()]),
            Term::Error(message) => wire(code::ERROR, vec![Value::from(message.as_str())]),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TEXT FORMAT
// ————————————————————————————————————————————————————————————————————————————

fn fmt_datum(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Array(_) | Value::Object(_) => {
            f.write_str("r.expr(")?;
            fmt_literal(f, value)?;
            f.write_str(")")
        }
        scalar => fmt_literal(f, scalar),
    }
}

/// Python literal syntax, nested containers included.
fn fmt_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("None"),
        Value::Bool(true) => f.write_str("True"),
        Value::Bool(false) => f.write_str("False"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(_) => write!(f, "{value}"),
        Value::Array(xs) => {
            f.write_str("[")?;
            for (i, x) in xs.iter().enumerate() {
                if i > 0 { f.write_str(", ")?; }
                fmt_literal(f, x)?;
            }
            f.write_str("]")
        }
        Value::Object(map) => {
            f.write_str("{")?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 { f.write_str(", ")?; }
                write!(f, "{}: ", Value::from(k.as_str()))?;
                fmt_literal(f, v)?;
            }
            f.write_str("}")
        }
    }
}

/// Method receivers must be terms, so bare scalars are wrapped in `r.expr`.
fn fmt_receiver(f: &mut fmt::Formatter<'_>, term: &Term) -> fmt::Result {
    match term {
        Term::Datum(v @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => {
            write!(f, "r.expr(")?;
            fmt_datum(f, v)?;
            write!(f, ")")
        }
        other => write!(f, "{other}"),
    }
}

fn fmt_list(f: &mut fmt::Formatter<'_>, terms: &[Term]) -> fmt::Result {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 { f.write_str(", ")?; }
        write!(f, "{t}")?;
    }
    Ok(())
}

fn fmt_method(f: &mut fmt::Formatter<'_>, recv: &Term, name: &str, args: &[&Term]) -> fmt::Result {
    fmt_receiver(f, recv)?;
    write!(f, ".{name}(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 { f.write_str(", ")?; }
        write!(f, "{a}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Datum(v) => fmt_datum(f, v),
            Term::Var(id) => write!(f, "{id}"),
            Term::Func { params, body } => {
                f.write_str("lambda ")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{p}")?;
                }
                write!(f, ": {body}")
            }
            Term::Funcall { func, args } => {
                f.write_str("r.do(")?;
                fmt_list(f, args)?;
                write!(f, ", {func})")
            }
            Term::TypeOf(a) => fmt_method(f, a, "type_of", &[]),
            Term::Eq(a, b) => fmt_method(f, a, "eq", &[&**b]),
            Term::Ne(a, b) => fmt_method(f, a, "ne", &[&**b]),
            Term::Lt(a, b) => fmt_method(f, a, "lt", &[&**b]),
            Term::Le(a, b) => fmt_method(f, a, "le", &[&**b]),
            Term::Gt(a, b) => fmt_method(f, a, "gt", &[&**b]),
            Term::Ge(a, b) => fmt_method(f, a, "ge", &[&**b]),
            Term::Not(a) => fmt_method(f, a, "not_", &[]),
            Term::And(xs) => {
                f.write_str("r.and_(")?;
                fmt_list(f, xs)?;
                f.write_str(")")
            }
            Term::Or(xs) => {
                f.write_str("r.or_(")?;
                fmt_list(f, xs)?;
                f.write_str(")")
            }
            Term::Add(a, b) => fmt_method(f, a, "add", &[&**b]),
            Term::Sub(a, b) => fmt_method(f, a, "sub", &[&**b]),
            Term::Div(a, b) => fmt_method(f, a, "div", &[&**b]),
            Term::Floor(a) => fmt_method(f, a, "floor", &[]),
            Term::Count(a) => fmt_method(f, a, "count", &[]),
            Term::Match(a, pattern) => {
                fmt_receiver(f, a)?;
                write!(f, ".match({})", Value::from(pattern.as_str()))
            }
            Term::HasFields(a, fields) => {
                fmt_receiver(f, a)?;
                f.write_str(".has_fields(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{}", Value::from(field.as_str()))?;
                }
                f.write_str(")")
            }
            Term::Bracket(a, key) => {
                fmt_receiver(f, a)?;
                write!(f, "[{key}]")
            }
            Term::Nth(a, index) => {
                fmt_receiver(f, a)?;
                write!(f, ".nth({index})")
            }
            Term::Keys(a) => fmt_method(f, a, "keys", &[]),
            Term::SetDifference(a, b) => fmt_method(f, a, "set_difference", &[&**b]),
            Term::Filter(a, p) => fmt_method(f, a, "filter", &[&**p]),
            Term::IsEmpty(a) => fmt_method(f, a, "is_empty", &[]),
            Term::Contains(a, b) => fmt_method(f, a, "contains", &[&**b]),
            Term::Branch(c, t, e) => write!(f, "r.branch({c}, {t}, {e})"),
            Term::Error(message) => write!(f, "r.error({})", Value::from(message.as_str())),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
