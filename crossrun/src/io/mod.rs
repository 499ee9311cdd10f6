//! I/O helpers for the comparator.

pub mod process;
pub mod runner;
pub mod settings;
pub mod summary;
pub mod tables;
