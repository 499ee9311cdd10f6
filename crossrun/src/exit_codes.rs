//! Stable exit codes for the `crossrun` binary.
//!
//! The invoking fuzzing harness keys on these values to decide whether a
//! testcase is kept as a new bug report.

/// Configurations behaved equivalently, or the comparison was inconclusive.
pub const PASS: i32 = 0;
/// Setup, usage or internal error. Never retried.
pub const TROUBLE: i32 = 1;
/// A divergence was found (suppressed or real; see the report text).
pub const FAIL: i32 = 2;
