//! Runs JSON-Schema-Test-Suite style files through the compiler and the local
//! evaluator.
use std::path::Path;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use schema_reql::path_de;
use schema_reql::{compile_with, CompileError, CompileOptions};

// ————————————————————————————————————————————————————————————————————————————
// SUITE FILES
// ————————————————————————————————————————————————————————————————————————————

/// One schema and the documents it is expected to accept or reject.
#[derive(Debug, Clone, Deserialize)]
pub struct TestGroup {
    pub description: String,
    pub schema: Value,
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub description: String,
    pub data: Value,
    pub valid: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// REPORTS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct FileReport {
    pub name: String,
    pub groups: Vec<GroupReport>,
}

#[derive(Debug, Clone)]
pub struct GroupReport {
    pub description: String,
    pub schema: Value,
    pub outcome: GroupOutcome,
}

#[derive(Debug, Clone)]
pub enum GroupOutcome {
    /// compilation failed; every case in the group counts as failed
    Rejected { error: CompileError, failed: usize },
    Ran { predicate: String, cases: Vec<CaseReport> },
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub description: String,
    pub data: Value,
    pub passed: bool,
    /// evaluation error, if the predicate raised one
    pub error: Option<String>,
}

impl GroupReport {
    pub fn passed(&self) -> usize {
        match &self.outcome {
            GroupOutcome::Rejected { .. } => 0,
            GroupOutcome::Ran { cases, .. } => cases.iter().filter(|c| c.passed).count(),
        }
    }

    pub fn failed(&self) -> usize {
        match &self.outcome {
            GroupOutcome::Rejected { failed, .. } => *failed,
            GroupOutcome::Ran { cases, .. } => cases.iter().filter(|c| !c.passed).count(),
        }
    }
}

impl FileReport {
    pub fn passed(&self) -> usize {
        self.groups.iter().map(GroupReport::passed).sum()
    }

    pub fn failed(&self) -> usize {
        self.groups.iter().map(GroupReport::failed).sum()
    }

    pub fn total(&self) -> usize {
        self.passed() + self.failed()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RUNNER
// ————————————————————————————————————————————————————————————————————————————

pub fn run_file(path: &Path, options: &CompileOptions) -> Result<FileReport> {
    let name = path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let groups = path_de::from_file_with_path::<Vec<TestGroup>>(path)?;
    Ok(FileReport {
        name,
        groups: groups.into_iter().map(|g| run_group(g, options)).collect(),
    })
}

/// Compile once, then evaluate every case. An evaluation error counts as
/// "invalid", matching how the engine reports diagnostic failures.
pub fn run_group(group: TestGroup, options: &CompileOptions) -> GroupReport {
    let TestGroup { description, schema, tests } = group;
    let outcome = match compile_with(&schema, "#", options) {
        Err(error) => GroupOutcome::Rejected { error, failed: tests.len() },
        Ok(predicate) => {
            let cases = tests.into_iter().map(|case| {
                let (passed, error) = match predicate.evaluate(&case.data) {
                    Ok(result) => (result == case.valid, None),
                    Err(error) => (!case.valid, Some(error.to_string())),
                };
                CaseReport { description: case.description, data: case.data, passed, error }
            }).collect();
            GroupOutcome::Ran { predicate: predicate.to_string(), cases }
        }
    };
    GroupReport { description, schema, outcome }
}

// ------------------------------- Tests ------------------------------------ //
