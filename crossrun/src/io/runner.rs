//! Runner abstraction for executing one configuration.
//!
//! The [`Runner`] trait decouples the comparison pipeline from process
//! launching. Tests use scripted runners that return predetermined results
//! without spawning processes.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::ExecutionResult;
use crate::io::process::run_engine;

/// Parameters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Executable followed by its arguments.
    pub argv: Vec<OsString>,
    /// Working directory for the child process.
    pub cwd: PathBuf,
    /// Wall-clock budget; exceeding it kills the child.
    pub timeout: Duration,
}

/// Abstraction over run backends.
///
/// Implementations must enforce the timeout (setting `timed_out`), flag
/// abnormal termination as `crashed`, and always return the output captured
/// up to termination. Errors are reserved for setup failures such as a
/// missing executable.
pub trait Runner {
    fn run(&self, request: &RunRequest) -> Result<ExecutionResult>;
}

impl<R: Runner + ?Sized> Runner for &R {
    fn run(&self, request: &RunRequest) -> Result<ExecutionResult> {
        (**self).run(request)
    }
}

/// Runner that spawns the engine as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Bytes of stdout/stderr kept per run.
    pub output_limit_bytes: usize,
    /// Exit codes that count as normal termination.
    pub non_crash_exit_codes: Vec<i32>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            output_limit_bytes: 10_000_000,
            non_crash_exit_codes: vec![0],
        }
    }
}

impl ProcessRunner {
    fn is_crash(&self, status: &ExitStatus) -> bool {
        match status.code() {
            Some(code) => !self.non_crash_exit_codes.contains(&code),
            // Terminated by a signal.
            None => true,
        }
    }
}

impl Runner for ProcessRunner {
    #[instrument(skip_all, fields(program = ?request.argv.first(), timeout_ms = request.timeout.as_millis() as u64))]
    fn run(&self, request: &RunRequest) -> Result<ExecutionResult> {
        let (program, args) = request
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("empty argv"))?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.cwd);

        let output = run_engine(cmd, request.timeout, self.output_limit_bytes)?;
        let crashed = !output.timed_out && self.is_crash(&output.status);
        if crashed {
            warn!(exit_code = ?output.status.code(), "run terminated abnormally");
        }
        debug!(
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "run captured"
        );
        Ok(ExecutionResult {
            stdout: output.stdout,
            stderr: output.stderr,
            crashed,
            timed_out: output.timed_out,
            exit_status: output.status.code(),
        })
    }
}
