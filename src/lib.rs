//! Compile draft-4 JSON Schema documents into ReQL predicates, so validation
//! can run inside the database as part of a query.
pub mod cli;
pub mod compile;
pub mod eval;
pub mod path_de;
pub mod reql;
pub mod schema;

pub use compile::{compile, compile_with, CompileError, CompileOptions, MultipleOfPolicy, Predicate};
