//! Crash-aware output capping.
//!
//! A crash can cut output mid-line. Comparing a crashed run against a complete
//! one would otherwise report the complete run's tail as extra lines.

use tracing::debug;

use crate::core::types::ExecutionResult;

/// Return both stdout buffers truncated to a comparable length.
///
/// - Neither run crashed, or both lengths are equal: unchanged.
/// - Both crashed: both capped to the shorter length.
/// - One crashed: both capped to the crashed run's length.
///
/// Never returns a slice longer than its source buffer.
pub fn cap_outputs<'a>(
    first: &'a ExecutionResult,
    second: &'a ExecutionResult,
) -> (&'a [u8], &'a [u8]) {
    let (len1, len2) = (first.stdout.len(), second.stdout.len());
    if len1 == len2 || (!first.crashed && !second.crashed) {
        return (&first.stdout, &second.stdout);
    }

    let cap = match (first.crashed, second.crashed) {
        (true, true) => len1.min(len2),
        (true, false) => len1,
        _ => len2,
    };
    debug!(cap, len1, len2, "capping outputs after crash");
    (
        &first.stdout[..cap.min(len1)],
        &second.stdout[..cap.min(len2)],
    )
}
