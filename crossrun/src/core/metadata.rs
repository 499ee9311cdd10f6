//! Metadata embedded in fuzzed testcases.

use anyhow::{Context, Result};
use regex::Regex;

/// Facts extracted from testcase text before any run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestcaseMetadata {
    /// Original source files the testcase was mutated from, in order of appearance.
    pub sources: Vec<String>,
}

/// Finds `print("<prefix><source>");` statements in a testcase.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    source_line: Regex,
}

impl MetadataExtractor {
    pub fn new(source_prefix: &str) -> Result<Self> {
        let pattern = format!(r#"^print\("{}(.*)"\);"#, regex::escape(source_prefix));
        let source_line = Regex::new(&pattern).context("compile source marker pattern")?;
        Ok(Self { source_line })
    }

    pub fn extract(&self, testcase: &str) -> TestcaseMetadata {
        let sources = testcase
            .lines()
            .filter_map(|line| self.source_line.captures(line))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect();
        TestcaseMetadata { sources }
    }
}
