//! Deterministic, pure logic for output comparison.
//!
//! Core modules must be free of I/O side effects. They operate on captured
//! bytes and in-memory rule tables and return deterministic outputs suitable
//! for tests.

pub mod adjust;
pub mod cap;
pub mod config_table;
pub mod decode;
pub mod diff;
pub mod metadata;
pub mod normalize;
pub mod report;
pub mod source_key;
pub mod suppression;
pub mod types;
pub mod verdict;
