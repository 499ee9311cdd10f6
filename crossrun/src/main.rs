//! `crossrun`: differential-execution correctness comparator.
//!
//! Prints the report on stdout and exits with one of the codes in
//! [`crossrun::exit_codes`].

use std::path::Path;
use std::process;

use clap::Parser;
use tracing::error;

use crossrun::cli::{self, Cli, INTERNAL_ERROR, UsageError, WRONG_USAGE};
use crossrun::core::report::render_header;
use crossrun::exit_codes;
use crossrun::io::summary::{ComparisonSummary, write_summary};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            // --help and --version.
            let _ = err.print();
            process::exit(exit_codes::PASS);
        }
        Err(err) => {
            print!("{}", render_header("", "", WRONG_USAGE));
            let _ = err.print();
            process::exit(exit_codes::TROUBLE);
        }
    };
    crossrun::logging::init();

    let (summary, code) = match cli::run(&cli) {
        Ok(outcome) => {
            for line in &outcome.log {
                println!("# {line}");
            }
            print!("{}", outcome.verdict.render());
            (
                ComparisonSummary::from_verdict(&outcome.verdict),
                outcome.verdict.status().exit_code(),
            )
        }
        Err(err) if err.downcast_ref::<UsageError>().is_some() => {
            print!("{}", render_header("", "", WRONG_USAGE));
            eprintln!("{err:#}");
            (ComparisonSummary::trouble(WRONG_USAGE), exit_codes::TROUBLE)
        }
        Err(err) => {
            error!(err = %format!("{err:#}"), "comparison failed");
            print!("{}", render_header("", "", INTERNAL_ERROR));
            println!("# Internal error: {err:#}");
            (ComparisonSummary::trouble(INTERNAL_ERROR), exit_codes::TROUBLE)
        }
    };

    if let Some(path) = cli.summary.as_deref() {
        write_summary_or_warn(path, &summary);
    }
    process::exit(code);
}

fn write_summary_or_warn(path: &Path, summary: &ComparisonSummary) {
    if let Err(err) = write_summary(path, summary) {
        eprintln!("{err:#}");
    }
}
