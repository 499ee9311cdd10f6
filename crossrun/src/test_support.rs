//! Test-only helpers: a scripted runner and result/configuration builders.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::suppression::{SuppressionRegistry, SuppressionTable};
use crate::core::types::{Configuration, ExecutionResult};
use crate::io::runner::{RunRequest, Runner};

/// Runner that returns queued results in order and records every request.
///
/// Running past the end of the script is an error, so a test notices
/// unexpected extra runs.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: RefCell<VecDeque<ExecutionResult>>,
    requests: RefCell<Vec<RunRequest>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.results.borrow().len()
    }
}

impl Runner for ScriptedRunner {
    fn run(&self, request: &RunRequest) -> Result<ExecutionResult> {
        self.requests.borrow_mut().push(request.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted result left for {:?}", request.argv))
    }
}

/// Clean run printing `stdout`.
pub fn output(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: stdout.as_bytes().to_vec(),
        exit_status: Some(0),
        ..ExecutionResult::default()
    }
}

/// Crashed run that printed `stdout` before dying.
pub fn crashed(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: stdout.as_bytes().to_vec(),
        crashed: true,
        exit_status: None,
        ..ExecutionResult::default()
    }
}

pub fn timed_out() -> ExecutionResult {
    ExecutionResult {
        timed_out: true,
        ..ExecutionResult::default()
    }
}

/// `x64` configuration of `/engine/d8` with the given flags.
pub fn config(label: &str, flags: &[&str]) -> Configuration {
    Configuration::new(
        label,
        "x64",
        "/engine/d8",
        flags.iter().map(|flag| flag.to_string()).collect(),
    )
}

/// Compile a suppression table from TOML text.
pub fn registry_from(toml: &str) -> SuppressionRegistry {
    SuppressionTable::parse(toml)
        .and_then(|table| table.compile())
        .expect("valid suppression table")
}
