//! Known-bug suppression tables and the compiled registry.
//!
//! Rules are data: a [`SuppressionTable`] is deserialized from TOML and
//! compiled once into a [`SuppressionRegistry`], which is read-only afterwards
//! and safe to share between concurrent comparisons.

use std::collections::{BTreeMap, TryReserveError};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::cap::cap_outputs;
use crate::core::decode::decode_output;
use crate::core::diff::{DEFAULT_SOURCE_PREFIX, DiffResult, diff_lines};
use crate::core::metadata::{MetadataExtractor, TestcaseMetadata};
use crate::core::normalize::Normalizer;
use crate::core::types::{Configuration, ExecutionResult};

const BUILTIN_TABLE: &str = include_str!("../../suppressions/default.toml");

static BUILTIN: LazyLock<SuppressionRegistry> = LazyLock::new(|| {
    SuppressionTable::parse(BUILTIN_TABLE)
        .and_then(|table| table.compile())
        .expect("built-in suppression table is valid")
});

/// Raw rule tables as written in TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SuppressionTable {
    /// Prefix of original-source marker lines in program output.
    pub source_prefix: Option<String>,
    /// Line separating a testcase preamble from generated code.
    pub content_start_marker: Option<String>,
    /// Lines deleted from every stdout before comparison.
    pub ignore_lines: Vec<String>,
    pub line_diff: Vec<LineDiffEntry>,
    pub content: Vec<BugPattern>,
    pub output: Vec<OutputEntry>,
    pub ignore_sources: Vec<SourceEntry>,
    pub known_failures: Vec<KnownFailure>,
    pub drop_flag_on_content: Vec<DropFlagEntry>,
    pub fallback_on_output: Vec<LineDiffEntry>,
}

/// Identified pattern (line-diff rules and fallback markers).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineDiffEntry {
    pub id: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BugPattern {
    pub bug: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputEntry {
    pub bug: String,
    /// `""` for every configuration, otherwise an arch or a config label.
    #[serde(default)]
    pub scope: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub bug: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnownFailure {
    pub source: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropFlagEntry {
    pub flag: String,
    pub pattern: String,
}

impl SuppressionTable {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parse suppression table")
    }

    /// Compile every pattern. Fails on the first invalid rule.
    pub fn compile(&self) -> Result<SuppressionRegistry> {
        let source_prefix = self
            .source_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_PREFIX.to_string());
        if source_prefix.is_empty() {
            bail!("source_prefix must be non-empty");
        }

        let line_diffs = self
            .line_diff
            .iter()
            .map(|entry| LineDiffRule::new(&entry.id, &entry.pattern))
            .collect::<Result<Vec<_>>>()?;
        let content = self
            .content
            .iter()
            .map(|entry| {
                Ok(ContentRule {
                    bug: checked_id(&entry.bug, "content.bug")?,
                    pattern: compile(&entry.pattern, false)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let output = self
            .output
            .iter()
            .map(|entry| {
                Ok(OutputRule {
                    bug: checked_id(&entry.bug, "output.bug")?,
                    scope: entry.scope.clone(),
                    pattern: compile(&entry.pattern, true)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let ignore_sources = self
            .ignore_sources
            .iter()
            .map(|entry| {
                Ok(SourceRule {
                    bug: checked_id(&entry.bug, "ignore_sources.bug")?,
                    files: entry.files.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let drop_flags = self
            .drop_flag_on_content
            .iter()
            .map(|entry| {
                Ok(DropFlagRule {
                    flag: checked_id(&entry.flag, "drop_flag_on_content.flag")?,
                    pattern: compile(&entry.pattern, false)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let fallback_markers = self
            .fallback_on_output
            .iter()
            .map(|entry| {
                Ok(FallbackRule {
                    id: checked_id(&entry.id, "fallback_on_output.id")?,
                    pattern: compile(&entry.pattern, true)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let known_failures = self
            .known_failures
            .iter()
            .map(|entry| (entry.source.clone(), entry.key.clone()))
            .collect();

        Ok(SuppressionRegistry {
            normalizer: Normalizer::compile(&self.ignore_lines)?,
            metadata: MetadataExtractor::new(&source_prefix)?,
            source_prefix,
            content_start_marker: self.content_start_marker.clone(),
            line_diffs,
            content,
            output,
            ignore_sources,
            known_failures,
            drop_flags,
            fallback_markers,
        })
    }
}

fn checked_id(id: &str, field: &str) -> Result<String> {
    if id.trim().is_empty() {
        bail!("{field} must be non-empty");
    }
    Ok(id.to_string())
}

fn compile(pattern: &str, multi_line: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .multi_line(multi_line)
        .build()
        .with_context(|| format!("compile pattern {pattern:?}"))
}

/// Rule allowing two corresponding lines to differ.
///
/// The pattern is anchored at the start of each line. When it has capture
/// groups, both lines must capture identical text for the rule to apply.
#[derive(Debug, Clone)]
pub struct LineDiffRule {
    pub id: String,
    pattern: Regex,
}

impl LineDiffRule {
    pub fn new(id: impl Into<String>, pattern: &str) -> Result<Self> {
        let id = id.into();
        let pattern = Regex::new(&format!("^(?:{pattern})"))
            .with_context(|| format!("compile line diff rule {id}"))?;
        Ok(Self { id, pattern })
    }

    pub fn allows(&self, line1: &str, line2: &str) -> bool {
        let (Some(caps1), Some(caps2)) = (self.pattern.captures(line1), self.pattern.captures(line2))
        else {
            return false;
        };
        let groups1 = caps1.iter().skip(1).map(|group| group.map(|m| m.as_str()));
        let groups2 = caps2.iter().skip(1).map(|group| group.map(|m| m.as_str()));
        let agree = groups1.eq(groups2);
        if agree {
            debug!(rule = %self.id, "line difference allowed");
        }
        agree
    }
}

#[derive(Debug, Clone)]
struct ContentRule {
    bug: String,
    pattern: Regex,
}

#[derive(Debug, Clone)]
struct OutputRule {
    bug: String,
    scope: String,
    pattern: Regex,
}

#[derive(Debug, Clone)]
struct SourceRule {
    bug: String,
    files: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DropFlagRule {
    pub(crate) flag: String,
    pub(crate) pattern: Regex,
}

#[derive(Debug, Clone)]
pub(crate) struct FallbackRule {
    pub(crate) id: String,
    pub(crate) pattern: Regex,
}

/// Compiled, read-only suppression rules.
#[derive(Debug, Clone)]
pub struct SuppressionRegistry {
    normalizer: Normalizer,
    metadata: MetadataExtractor,
    source_prefix: String,
    content_start_marker: Option<String>,
    line_diffs: Vec<LineDiffRule>,
    content: Vec<ContentRule>,
    output: Vec<OutputRule>,
    ignore_sources: Vec<SourceRule>,
    known_failures: BTreeMap<String, String>,
    pub(crate) drop_flags: Vec<DropFlagRule>,
    pub(crate) fallback_markers: Vec<FallbackRule>,
}

impl SuppressionRegistry {
    /// Registry compiled from the embedded default table.
    pub fn builtin() -> &'static SuppressionRegistry {
        &BUILTIN
    }

    /// Copy with line-diff, output and ignore-source suppressions disabled.
    ///
    /// Ignore lines, content rules, flag drops and fallback markers stay active.
    pub fn without_suppressions(&self) -> Self {
        Self {
            line_diffs: Vec::new(),
            output: Vec::new(),
            ignore_sources: Vec::new(),
            ..self.clone()
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn metadata(&self, testcase: &str) -> TestcaseMetadata {
        self.metadata.extract(testcase)
    }

    /// Bug id of the first content rule found in the generated part of `testcase`.
    pub fn ignore_by_content(&self, testcase: &str) -> Option<&str> {
        let content = self.generated_content(testcase);
        self.content
            .iter()
            .find(|rule| rule.pattern.is_match(content))
            .map(|rule| rule.bug.as_str())
    }

    /// Bug id of the first ignore-source entry naming one of the testcase's sources.
    pub fn ignore_by_metadata(&self, metadata: &TestcaseMetadata) -> Option<&str> {
        self.ignore_sources
            .iter()
            .find(|rule| {
                rule.files
                    .iter()
                    .any(|file| metadata.sources.iter().any(|source| source == file))
            })
            .map(|rule| rule.bug.as_str())
    }

    /// Bug id of the first output rule matching `text`.
    ///
    /// Scopes are checked in fixed order: all configurations, the config's
    /// architecture, then its label.
    pub fn ignore_by_output(&self, config: &Configuration, text: &str) -> Option<&str> {
        [
            "",
            config.arch.as_str(),
            config.label.as_str(),
        ]
        .into_iter()
        .find_map(|scope| {
            self.output
                .iter()
                .filter(|rule| rule.scope == scope)
                .find(|rule| rule.pattern.is_match(text))
                .map(|rule| rule.bug.as_str())
        })
    }

    /// Fixed source key for a source known to produce a particular failure.
    pub fn known_failure(&self, source: &str) -> Option<&str> {
        self.known_failures.get(source).map(String::as_str)
    }

    pub fn known_failures(&self) -> &BTreeMap<String, String> {
        &self.known_failures
    }

    /// Cap, decode and diff two runs whose ignored lines were already stripped.
    pub fn diff(
        &self,
        first: &ExecutionResult,
        second: &ExecutionResult,
    ) -> Result<DiffResult, TryReserveError> {
        let (bytes1, bytes2) = cap_outputs(first, second);
        let text1 = decode_output(bytes1)?;
        let text2 = decode_output(bytes2)?;
        let lines1: Vec<&str> = text1.lines().collect();
        let lines2: Vec<&str> = text2.lines().collect();
        Ok(self.diff_lines(&lines1, &lines2))
    }

    pub fn diff_lines(&self, lines1: &[&str], lines2: &[&str]) -> DiffResult {
        diff_lines(lines1, lines2, &self.line_diffs, &self.source_prefix)
    }

    fn generated_content<'a>(&self, testcase: &'a str) -> &'a str {
        let Some(marker) = self.content_start_marker.as_deref() else {
            return testcase;
        };
        let mut offset = 0usize;
        for line in testcase.split_inclusive('\n') {
            if line.trim_end_matches(['\n', '\r']) == marker {
                return &testcase[offset..];
            }
            offset += line.len();
        }
        // Older minimized testcases may have dropped the marker line.
        testcase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
content_start_marker = 'print("start");'
ignore_lines = ['^Warning: .*$']

[[line_diff]]
id = "not-a-function"
pattern = 'TypeError: .* is not a function'

[[content]]
bug = "bug-content"
pattern = 'forbiddenCall\('

[[output]]
bug = "bug-all"
pattern = '^.*Stack overflow$'

[[output]]
bug = "bug-arm"
scope = "arm"
pattern = '^arm only$'

[[output]]
bug = "bug-label"
scope = "optimizing"
pattern = '^arm only$'

[[ignore_sources]]
bug = "bug-source"
files = ["mjsunit/flaky.js"]

[[known_failures]]
source = "mjsunit/known.js"
key = "known"
"#;

    fn registry() -> SuppressionRegistry {
        SuppressionTable::parse(TABLE)
            .expect("parse")
            .compile()
            .expect("compile")
    }

    fn config(arch: &str, label: &str) -> Configuration {
        Configuration::new(label, arch, "d8", Vec::new())
    }

    #[test]
    fn builtin_table_compiles() {
        let registry = SuppressionRegistry::builtin();
        assert!(registry.normalizer().strip_ignored(b"Warning: --foo is deprecated\n").is_empty());
    }

    #[test]
    fn content_rules_search_after_marker() {
        let registry = registry();
        let before_marker = "forbiddenCall();\nprint(\"start\");\nok();\n";
        assert_eq!(registry.ignore_by_content(before_marker), None);

        let after_marker = "prelude();\nprint(\"start\");\nforbiddenCall();\n";
        assert_eq!(registry.ignore_by_content(after_marker), Some("bug-content"));
    }

    #[test]
    fn content_rules_search_everything_without_marker() {
        let registry = registry();
        assert_eq!(
            registry.ignore_by_content("forbiddenCall(1);"),
            Some("bug-content")
        );
    }

    #[test]
    fn metadata_matches_ignored_sources() {
        let registry = registry();
        let metadata = TestcaseMetadata {
            sources: vec!["mjsunit/ok.js".to_string(), "mjsunit/flaky.js".to_string()],
        };
        assert_eq!(registry.ignore_by_metadata(&metadata), Some("bug-source"));
        assert_eq!(
            registry.ignore_by_metadata(&TestcaseMetadata::default()),
            None
        );
    }

    #[test]
    fn output_scopes_apply_in_order() {
        let registry = registry();
        let overflow = "1\nRangeError: Stack overflow\n";
        assert_eq!(
            registry.ignore_by_output(&config("x64", "default"), overflow),
            Some("bug-all")
        );
        assert_eq!(
            registry.ignore_by_output(&config("arm", "optimizing"), "arm only\n"),
            Some("bug-arm")
        );
        assert_eq!(
            registry.ignore_by_output(&config("x64", "optimizing"), "arm only\n"),
            Some("bug-label")
        );
        assert_eq!(
            registry.ignore_by_output(&config("x64", "default"), "arm only\n"),
            None
        );
    }

    #[test]
    fn without_suppressions_disables_output_rules() {
        let registry = registry().without_suppressions();
        assert_eq!(
            registry.ignore_by_output(&config("x64", "default"), "Stack overflow"),
            None
        );
        assert!(registry.normalizer().strip_ignored(b"Warning: x\n").is_empty());
        assert_eq!(registry.ignore_by_content("forbiddenCall()"), Some("bug-content"));
    }

    #[test]
    fn known_failure_lookup() {
        let registry = registry();
        assert_eq!(registry.known_failure("mjsunit/known.js"), Some("known"));
        assert_eq!(registry.known_failure("mjsunit/other.js"), None);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let table = SuppressionTable {
            content: vec![BugPattern {
                bug: "bug".to_string(),
                pattern: "(".to_string(),
            }],
            ..SuppressionTable::default()
        };
        assert!(table.compile().is_err());
    }

    #[test]
    fn empty_bug_id_is_rejected() {
        let table = SuppressionTable {
            output: vec![OutputEntry {
                bug: " ".to_string(),
                scope: String::new(),
                pattern: "x".to_string(),
            }],
            ..SuppressionTable::default()
        };
        assert!(table.compile().is_err());
    }

    #[test]
    fn diff_caps_crashed_output() {
        let registry = registry();
        let first = ExecutionResult {
            stdout: b"abc\n".to_vec(),
            crashed: true,
            ..ExecutionResult::default()
        };
        let second = ExecutionResult {
            stdout: b"abc\ndef\nghi".to_vec(),
            ..ExecutionResult::default()
        };
        let result = registry.diff(&first, &second).expect("diff");
        assert!(result.is_equivalent());
    }
}
