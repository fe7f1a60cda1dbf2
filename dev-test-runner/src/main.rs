//! Conformance runner: compiles every schema in a JSON-Schema-Test-Suite
//! directory and checks each case with the local evaluator.
mod suite;

use std::path::PathBuf;
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use colored::{Color, Colorize};
use rayon::prelude::*;

use schema_reql::cli::parse_epsilon;
use schema_reql::{CompileError, CompileOptions, MultipleOfPolicy};
use suite::{FileReport, GroupOutcome};

#[derive(Parser, Debug)]
struct Settings {
    /// directory holding the draft-4 suite files
    #[arg(long, default_value = "./JSON-Schema-Test-Suite/tests/draft4/")]
    dir: PathBuf,

    /// glob to match filenames (prefix, e.g. `max` or `prop*`)
    #[arg(long = "match", default_value = "")]
    match_: String,

    /// compile in diagnostic mode
    #[arg(long, default_value_t = false)]
    diagnostics: bool,

    /// accept `multipleOf` quotients within this distance of an integer
    #[arg(long, value_parser = parse_epsilon)]
    multiple_of_epsilon: Option<f64>,

    /// only print the final results
    #[arg(long, short, default_value_t = false)]
    quiet: bool,

    /// exit non-zero if any case failed
    #[arg(long, default_value_t = false)]
    strict: bool,
}

fn main() -> Result<()> {
    let settings = Settings::parse();
    let options = CompileOptions {
        diagnostics: settings.diagnostics,
        multiple_of: settings.multiple_of_epsilon
            .map(MultipleOfPolicy::Tolerance)
            .unwrap_or_default(),
    };

    let pattern = settings.dir.join(format!("{}*.json", settings.match_));
    let pattern = pattern.to_string_lossy();
    let mut files = glob::glob(&pattern)
        .with_context(|| format!("bad file pattern {pattern}"))?
        .collect::<Result<Vec<_>, _>>()?;
    files.sort();
    if files.is_empty() {
        bail!("no suite files match {pattern}");
    }

    // compilation is stateless, so files run in parallel; printing stays ordered
    let reports = files.par_iter()
        .map(|path| suite::run_file(path, &options))
        .collect::<Result<Vec<_>>>()?;

    if !settings.quiet {
        for report in &reports {
            print_report(report);
        }
    }
    let failed = summary(&reports);
    if settings.strict && failed > 0 {
        bail!("{failed} test(s) failed");
    }
    Ok(())
}

fn print_report(report: &FileReport) {
    println!("{}", report.name.bold());
    for group in &report.groups {
        println!("{}", format!(" {}", group.description).yellow().bold());
        match &group.outcome {
            GroupOutcome::Rejected { error, failed } => {
                let line = match error {
                    CompileError::Unsupported { keyword, .. } => {
                        format!("  schema had unimplemented keyword \"{keyword}\" autofailed {failed} tests")
                    }
                    other => format!("  schema failed to compile ({other}) autofailed {failed} tests"),
                };
                println!("{}", line.red().bold());
            }
            GroupOutcome::Ran { predicate, cases } => {
                for case in cases {
                    print!("  {}: ", case.description);
                    if case.passed {
                        println!("{}", "passed".green());
                        continue;
                    }
                    println!("{}", "failed".red().bold());
                    println!("    Data: {}", case.data);
                    println!("    Schema: {}", group.schema);
                    println!("    ReQL: {predicate}");
                    if let Some(error) = &case.error {
                        println!("    Error: {error}");
                    }
                }
            }
        }
    }
}

/// Prints per-file and overall tallies; returns the number of failed cases.
fn summary(reports: &[FileReport]) -> usize {
    let mut total_overall = 0;
    let mut total_passed = 0;
    println!("\n\n{}", "Final Results".white().bold());
    for report in reports {
        let (passed, total) = (report.passed(), report.total());
        total_passed += passed;
        total_overall += total;
        let line = format!(" {} : passed {passed}/{total}", report.name);
        println!("{}", line.color(pass_color(passed, total)).bold());
    }
    print!("\n{}", "Total:".white().bold());
    let line = format!(" passed {total_passed}/{total_overall}");
    println!("{}", line.color(pass_color(total_passed, total_overall)).bold());
    total_overall - total_passed
}

fn pass_color(passed: usize, total: usize) -> Color {
    if passed == total {
        Color::Green
    } else if passed > total / 2 {
        Color::Yellow
    } else {
        Color::Red
    }
}
