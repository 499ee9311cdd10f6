//! Shared deterministic types for the comparison core.
//!
//! These types define stable contracts between core components. They carry no
//! I/O handles; a [`Configuration`] only describes how a run would be invoked.

use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::normalize::Normalizer;

/// One named way of running the engine under test.
///
/// The flag sequence is deterministic for a given table label and adjustment
/// history. Per-testcase adjustments operate on owned clones, never on the
/// shared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Configuration table label (e.g. `interpreter`).
    pub label: String,
    /// Architecture of the executable (e.g. `x64`).
    pub arch: String,
    /// Engine executable to launch.
    pub executable: PathBuf,
    /// Ordered command-line flags.
    pub flags: Vec<String>,
    /// Same-architecture variant used when cross-architecture comparison is
    /// not meaningful for a testcase.
    pub fallback: Option<Box<Configuration>>,
}

impl Configuration {
    pub fn new(
        label: impl Into<String>,
        arch: impl Into<String>,
        executable: impl Into<PathBuf>,
        flags: Vec<String>,
    ) -> Self {
        Self {
            label: label.into(),
            arch: arch.into(),
            executable: executable.into(),
            flags,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Configuration) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Label used in reports: `<arch>,<label>`.
    pub fn display_label(&self) -> String {
        format!("{},{}", self.arch, self.label)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|candidate| candidate == flag)
    }

    /// Remove every occurrence of `flag`, including from the fallback.
    ///
    /// Returns `true` if anything was removed. Removing an absent flag is a no-op.
    pub fn remove_flag(&mut self, flag: &str) -> bool {
        let before = self.flags.len();
        self.flags.retain(|candidate| candidate != flag);
        let removed_here = self.flags.len() != before;
        let removed_fallback = self
            .fallback
            .as_mut()
            .is_some_and(|fallback| fallback.remove_flag(flag));
        removed_here || removed_fallback
    }

    /// Flags joined by single spaces, as shown in reports.
    pub fn flags_line(&self) -> String {
        self.flags.join(" ")
    }

    /// Full argument vector: executable, flags, preamble files, then the testcase.
    pub fn argv(&self, preamble: &[PathBuf], testcase: &Path) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(2 + self.flags.len() + preamble.len());
        argv.push(self.executable.as_os_str().to_os_string());
        argv.extend(self.flags.iter().map(OsString::from));
        argv.extend(preamble.iter().map(|path| path.as_os_str().to_os_string()));
        argv.push(testcase.as_os_str().to_os_string());
        argv
    }
}

/// Captured outcome of one run of one configuration.
///
/// Created once per (input, configuration) run by a runner. The only mutation
/// is [`ExecutionResult::strip_ignored`], applied before capping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Abnormal or non-zero termination.
    pub crashed: bool,
    /// Killed after exceeding the wall-clock timeout.
    pub timed_out: bool,
    /// Exit code, `None` when terminated by a signal.
    pub exit_status: Option<i32>,
}

impl ExecutionResult {
    /// Delete ignorable lines from the stored stdout in place.
    ///
    /// Must run before capping so a byte-length cap can never split an
    /// ignorable line and leave an unmatched remainder behind.
    pub fn strip_ignored(&mut self, normalizer: &Normalizer) {
        if let Cow::Owned(stripped) = normalizer.strip_ignored(&self.stdout) {
            self.stdout = stripped;
        }
    }

    /// True if the run ended in a state that cannot be compared by itself.
    pub fn is_inconclusive(&self) -> bool {
        self.timed_out || self.crashed
    }
}
