//! Minimal CLI: schema → (predicate text | wire JSON), or check documents locally
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;

use crate::compile::{compile_with, CompileOptions, MultipleOfPolicy, Predicate};
use crate::path_de;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile draft-4 JSON Schemas into ReQL predicates
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile each schema and print its predicate
    Compile(CompileOut),
    /// compile a schema and evaluate it against documents with the local evaluator
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct CompileSettings {
    /// failing checks raise an error naming the schema path instead of returning false
    #[arg(long, default_value_t = false)]
    diagnostics: bool,

    /// accept `multipleOf` quotients within this distance of an integer (exact when omitted)
    #[arg(long, value_parser = parse_epsilon)]
    multiple_of_epsilon: Option<f64>,

    /// JSON Pointer to the schema inside each schema file (e.g. /definitions/user)
    #[arg(long)]
    json_pointer: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// driver-style ReQL text
    Text,
    /// JSON term protocol, one line per schema
    Wire,
    /// JSON term protocol, indented
    PrettyWire,
}

#[derive(clap::Parser, Debug)]
struct CompileOut {
    #[command(flatten)]
    settings: CompileSettings,

    /// One or more schema files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    settings: CompileSettings,

    /// the schema file
    #[arg(long, short)]
    schema: PathBuf,

    /// One or more document files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// treat inputs as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CompileSettings {
    fn options(&self) -> CompileOptions {
        CompileOptions {
            diagnostics: self.diagnostics,
            multiple_of: match self.multiple_of_epsilon {
                Some(eps) => MultipleOfPolicy::Tolerance(eps),
                None => MultipleOfPolicy::Exact,
            },
        }
    }

    fn load_compile(&self, source_path: &Path) -> Result<Predicate> {
        let document = path_de::from_file_with_path::<Value>(source_path)?;
        let schema = match self.json_pointer.as_deref() {
            None => &document,
            Some(pointer) => document.pointer(pointer).ok_or_else(|| {
                anyhow!("JSON pointer {pointer} selects nothing in {}", source_path.display())
            })?,
        };
        compile_with(schema, "#", &self.options())
            .with_context(|| format!("failed to compile {}", source_path.display()))
    }
}

impl Format {
    fn render(self, predicate: &Predicate) -> Result<String> {
        Ok(match self {
            Format::Text => predicate.to_string(),
            Format::Wire => serde_json::to_string(&predicate.to_wire())?,
            Format::PrettyWire => serde_json::to_string_pretty(&predicate.to_wire())?,
        })
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Compile(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let source_paths = resolve_file_path_patterns(&target.input)?;
                let mut rendered = Vec::with_capacity(source_paths.len());
                for source_path in &source_paths {
                    let predicate = target.settings.load_compile(source_path)?;
                    rendered.push(target.format.render(&predicate)?);
                    if source_paths.len() > 1 {
                        eprintln!("{} {}", "compiled".green(), source_path.display());
                    }
                }
                let output = rendered.join("\n");
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &output)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{output}");
                }
                Ok(())
            }
            Command::Check(target) => {
                let predicate = target.settings.load_compile(&target.schema)?;
                let mut failed = 0usize;
                for source_path in resolve_file_path_patterns(&target.input)? {
                    for (label, document) in load_documents(&source_path, target.ndjson)? {
                        match predicate.evaluate(&document) {
                            Ok(true) => println!("{label}: {}", "valid".green()),
                            Ok(false) => {
                                failed += 1;
                                println!("{label}: {}", "invalid".red().bold());
                            }
                            Err(error) => {
                                failed += 1;
                                println!("{label}: {} {error}", "invalid:".red().bold());
                            }
                        }
                    }
                }
                if failed > 0 {
                    bail!("{failed} document(s) failed validation");
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `--multiple-of-epsilon` values: finite and non-negative.
pub fn parse_epsilon(raw: &str) -> Result<f64, String> {
    let eps = raw.parse::<f64>().map_err(|e| format!("{raw:?} is not a number: {e}"))?;
    if !eps.is_finite() || eps < 0.0 {
        return Err(format!("must be a finite, non-negative number, found {raw}"));
    }
    Ok(eps)
}

/// Whole-file JSON, or one document per non-empty line for NDJSON.
fn load_documents(source_path: &Path, ndjson: bool) -> Result<Vec<(String, Value)>> {
    let label = source_path.display().to_string();
    if !ndjson {
        let document = path_de::from_file_with_path::<Value>(source_path)?;
        return Ok(vec![(label, document)]);
    }
    let source = std::fs::read_to_string(source_path)
        .with_context(|| format!("failed to read {label}"))?;
    let mut out = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_label = format!("{label}:{}", i + 1);
        let document = path_de::from_str_with_path::<Value>(line, &line_label)?;
        out.push((line_label, document));
    }
    Ok(out)
}

pub(crate) fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern)? {
            out.push(entry?);
        }
        if out.len() == before {
            // explicitly a glob but matched nothing
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }

    #[test]
    fn empty_globs_are_errors() {
        let err = resolve_file_path_patterns(["/no/such/dir/*.json"]).unwrap_err();
        assert!(err.to_string().contains("matched no files"));
    }

    #[test]
    fn epsilon_selects_tolerance_policy() {
        let settings = CompileSettings { diagnostics: true, multiple_of_epsilon: Some(1e-6), json_pointer: None };
        let options = settings.options();
        assert!(options.diagnostics);
        assert_eq!(options.multiple_of, MultipleOfPolicy::Tolerance(1e-6));
    }

    #[test]
    fn epsilon_must_be_finite_and_non_negative() {
        assert_eq!(parse_epsilon("1e-9"), Ok(1e-9));
        assert_eq!(parse_epsilon("0"), Ok(0.0));
        for raw in ["-0.5", "NaN", "inf", "abc"] {
            assert!(parse_epsilon(raw).is_err(), "{raw}");
        }
        let parsed = CommandLineInterface::try_parse_from([
            "schema-reql", "compile", "-i", "s.json", "--multiple-of-epsilon=-1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_parses_compile_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "schema-reql", "compile", "-i", "s.json", "--format", "pretty-wire", "--diagnostics",
        ]).unwrap();
        let Command::Compile(target) = cli.cmd else { panic!("expected compile") };
        assert_eq!(target.format, Format::PrettyWire);
        assert!(target.settings.diagnostics);
        assert_eq!(target.input, vec!["s.json".to_string()]);
    }
}
