//! Differential-execution correctness comparator.
//!
//! Given one input program and two or more execution configurations of the same
//! engine, this crate runs every configuration, normalizes the captured output
//! and decides whether the configurations behaved equivalently. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalization, capping, diffing,
//!   suppression rules, configuration adjustment, report rendering). No I/O.
//! - **[`io`]**: Side-effecting operations (process execution, settings and
//!   rule-table files, summaries). Isolated behind traits so tests can script runs.
//!
//! The [`compare`] module drives core logic through a [`io::runner::Runner`] and
//! produces a [`core::verdict::Verdict`]; [`cli`] wires it to the `crossrun` binary.

pub mod cli;
pub mod compare;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
