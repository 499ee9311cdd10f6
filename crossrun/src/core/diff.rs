//! Lock-step line comparison with allowed-difference rules.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::suppression::LineDiffRule;

/// Lines longer than this many characters are never matched against rules
/// and are shown truncated.
pub const MAX_LINE_LENGTH: usize = 512;

/// Prefix of the marker lines a fuzzed program prints when it enters code
/// taken from an original source file.
pub const DEFAULT_SOURCE_PREFIX: &str = "fuzz source: ";

static CARET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\^\s*$").expect("caret pattern is valid"));

/// Outcome of comparing two line sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Readable description of the first divergence, `None` if equivalent.
    pub difference: Option<String>,
    /// Last original-source marker seen on lines equal in both outputs.
    pub source: Option<String>,
}

impl DiffResult {
    pub fn is_equivalent(&self) -> bool {
        self.difference.is_none()
    }
}

/// Compare two outputs line by line.
///
/// Stops at the first divergence that is neither explained by a caret line
/// directly below it on both sides nor allowed by one of `allowed`.
pub fn diff_lines(
    lines1: &[&str],
    lines2: &[&str],
    allowed: &[LineDiffRule],
    source_prefix: &str,
) -> DiffResult {
    let mut source: Option<String> = None;

    for index in 0..lines1.len().max(lines2.len()) {
        let (line1, line2) = match (lines1.get(index), lines2.get(index)) {
            (Some(line1), Some(line2)) => (*line1, *line2),
            (None, Some(line2)) => {
                return DiffResult {
                    difference: Some(format!("+ {}", short_line_output(line2))),
                    source,
                };
            }
            (Some(line1), None) => {
                return DiffResult {
                    difference: Some(format!("- {}", short_line_output(line1))),
                    source,
                };
            }
            (None, None) => unreachable!("both outputs ended before index {index}"),
        };

        if line1 == line2 {
            // Only equal lines may move the source pointer.
            if let Some(rest) = line1.strip_prefix(source_prefix) {
                source = Some(rest.to_string());
            }
            continue;
        }

        // Error messages above a caret may legitimately differ in detail.
        if caret_match(lines1.get(index + 1), lines2.get(index + 1)) {
            continue;
        }

        if allowed_by_rule(line1, line2, allowed) {
            continue;
        }

        return DiffResult {
            difference: Some(format!(
                "- {}\n+ {}",
                short_line_output(line1),
                short_line_output(line2)
            )),
            source,
        };
    }

    DiffResult {
        difference: None,
        source,
    }
}

fn caret_match(line1: Option<&&str>, line2: Option<&&str>) -> bool {
    let (Some(line1), Some(line2)) = (line1, line2) else {
        return false;
    };
    if exceeds_max_length(line1) || exceeds_max_length(line2) {
        return false;
    }
    CARET_RE.is_match(line1) && CARET_RE.is_match(line2)
}

fn allowed_by_rule(line1: &str, line2: &str, allowed: &[LineDiffRule]) -> bool {
    if exceeds_max_length(line1) || exceeds_max_length(line2) {
        return false;
    }
    allowed.iter().any(|rule| rule.allows(line1, line2))
}

fn exceeds_max_length(line: &str) -> bool {
    line.len() > MAX_LINE_LENGTH && line.chars().count() > MAX_LINE_LENGTH
}

/// Truncate over-long lines for display.
pub fn short_line_output(line: &str) -> Cow<'_, str> {
    match line.char_indices().nth(MAX_LINE_LENGTH) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &line[..cut])),
        None => Cow::Borrowed(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(patterns: &[&str]) -> Vec<LineDiffRule> {
        patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                LineDiffRule::new(format!("rule-{index}"), pattern).expect("compile")
            })
            .collect()
    }

    fn diff(lines1: &[&str], lines2: &[&str], allowed: &[LineDiffRule]) -> DiffResult {
        diff_lines(lines1, lines2, allowed, DEFAULT_SOURCE_PREFIX)
    }

    #[test]
    fn identical_outputs_are_equivalent() {
        let lines = ["a", "", "  ^", "fuzz source: x.js", "b"];
        let result = diff(&lines, &lines, &[]);
        assert!(result.is_equivalent());
        assert_eq!(result.source.as_deref(), Some("x.js"));
    }

    #[test]
    fn empty_outputs_are_equivalent() {
        assert_eq!(diff(&[], &[], &[]), DiffResult::default());
    }

    #[test]
    fn extra_line_on_second_side() {
        let result = diff(&["a", "b"], &["a", "b", "c"], &[]);
        assert_eq!(result.difference.as_deref(), Some("+ c"));
    }

    #[test]
    fn missing_line_on_second_side() {
        let result = diff(&["a", "b", "c"], &["a", "b"], &[]);
        assert_eq!(result.difference.as_deref(), Some("- c"));
    }

    #[test]
    fn differing_lines_report_both_sides() {
        let result = diff(&["42"], &["43"], &[]);
        assert_eq!(result.difference.as_deref(), Some("- 42\n+ 43"));
    }

    #[test]
    fn caret_lookahead_skips_differing_message() {
        let result = diff(
            &["TypeError: x is not a function", "    ^"],
            &["TypeError: y is not a function", "    ^"],
            &[],
        );
        assert!(result.is_equivalent());
    }

    #[test]
    fn differing_caret_columns_are_reported_without_rule() {
        let result = diff(
            &["TypeError: x is not a function", "    ^"],
            &["TypeError: y is not a function", "  ^"],
            &[],
        );
        assert_eq!(result.difference.as_deref(), Some("-     ^\n+   ^"));

        let allowed = rules(&[r"^\s*\^\s*$"]);
        let result = diff(
            &["TypeError: x is not a function", "    ^"],
            &["TypeError: y is not a function", "  ^"],
            &allowed,
        );
        assert!(result.is_equivalent());
    }

    #[test]
    fn caret_on_one_side_only_is_a_difference() {
        let result = diff(&["x: 1", "    ^"], &["x: 2", "done"], &[]);
        assert_eq!(result.difference.as_deref(), Some("- x: 1\n+ x: 2"));
    }

    #[test]
    fn rule_without_groups_allows_difference() {
        let allowed = rules(&[r"TypeError: .* is not a function"]);
        let result = diff(
            &["TypeError: x is not a function", "after"],
            &["TypeError: y is not a function", "after"],
            &allowed,
        );
        assert!(result.is_equivalent());
    }

    #[test]
    fn rule_groups_must_agree() {
        let allowed = rules(&[r"^(\w+)Error: .*$"]);
        let same_group = diff(&["TypeError: a"], &["TypeError: b"], &allowed);
        assert!(same_group.is_equivalent());

        let other_group = diff(&["TypeError: a"], &["RangeError: a"], &allowed);
        assert_eq!(
            other_group.difference.as_deref(),
            Some("- TypeError: a\n+ RangeError: a")
        );
    }

    #[test]
    fn rules_anchor_at_line_start() {
        let allowed = rules(&[r"Error"]);
        let result = diff(&["a Error"], &["b Error"], &allowed);
        assert!(!result.is_equivalent());
    }

    #[test]
    fn source_pointer_ignores_differing_lines() {
        let allowed = rules(&[r"fuzz source: "]);
        let result = diff(
            &["fuzz source: a.js", "fuzz source: b.js", "1"],
            &["fuzz source: a.js", "fuzz source: c.js", "2"],
            &allowed,
        );
        assert_eq!(result.source.as_deref(), Some("a.js"));
        assert_eq!(result.difference.as_deref(), Some("- 1\n+ 2"));
    }

    #[test]
    fn long_lines_skip_rules_and_are_truncated() {
        let long1 = format!("{}1", "x".repeat(MAX_LINE_LENGTH));
        let long2 = format!("{}2", "x".repeat(MAX_LINE_LENGTH));
        let allowed = rules(&[r".*"]);
        let result = diff(&[long1.as_str()], &[long2.as_str()], &allowed);
        let expected_prefix = "x".repeat(MAX_LINE_LENGTH);
        assert_eq!(
            result.difference,
            Some(format!("- {expected_prefix}...\n+ {expected_prefix}..."))
        );
    }

    #[test]
    fn short_line_output_respects_char_boundaries() {
        let line = "é".repeat(MAX_LINE_LENGTH + 1);
        let short = short_line_output(&line);
        assert_eq!(short.chars().count(), MAX_LINE_LENGTH + 3);
        assert!(short.ends_with("..."));
    }
}
