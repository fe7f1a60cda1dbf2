//! Per-node check accumulator.
//!
//! Unconditional checks keep their order. Type-conditional ("soft") checks are
//! bucketed by runtime type tag and each non-empty bucket becomes one guarded
//! branch at finalization, so several string keywords share a single
//! `type_of() == "STRING"` test.
use indexmap::IndexMap;

use crate::reql::{self, Term, TypeTag, VarId};
use crate::schema::{Placement, SchemaPath};
use super::Check;

#[derive(Debug)]
pub struct Context {
    var: VarId,
    path: SchemaPath,
    diagnostics: bool,
    checks: Vec<Term>,
    soft: IndexMap<TypeTag, Vec<Term>>,
}

impl Context {
    pub fn new(var: VarId, path: SchemaPath, diagnostics: bool) -> Self {
        Self { var, path, diagnostics, checks: Vec::new(), soft: IndexMap::new() }
    }

    /// Add a check that holds for every instance type.
    pub fn require(&mut self, check: Check) {
        let term = self.wrap(check);
        self.checks.push(term);
    }

    /// Add a check that only means something for instances tagged `tag`.
    pub fn place(&mut self, tag: TypeTag, placement: Placement, check: Check) {
        match placement {
            Placement::Direct => self.require(check),
            Placement::Soft => {
                let term = self.wrap(check);
                self.soft.entry(tag).or_default().push(term);
            }
            Placement::Drop => {}
        }
    }

    /// In diagnostic mode a failing check raises instead of returning `false`.
    fn wrap(&self, check: Check) -> Term {
        if self.diagnostics {
            reql::branch(check.test, true, reql::error(format!("{} {}", self.path, check.message)))
        } else {
            check.test
        }
    }

    /// Unconditional checks, then one guarded branch per soft bucket, as a
    /// single conjunction. No checks at all is the constant `true`.
    pub fn finalize(self) -> Term {
        let Self { var, mut checks, soft, .. } = self;
        for (tag, bucket) in soft {
            let guard = Term::Var(var).type_of().equals(tag);
            checks.push(reql::branch(guard, Term::and_all(bucket), true));
        }
        Term::and_all(checks)
    }
}

// ------------------------------- Tests ------------------------------------ //
