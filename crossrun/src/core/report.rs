//! Stable report text consumed by bug-filing tooling.
//!
//! Suppressed and real failures share the header block. Only real failures
//! carry the detail block, which starts with [`CHECK_SENTINEL`]. Per-run output
//! is fenced by `### Start/End of configuration <label>` lines so line-oriented
//! tools can cut each run's raw output out of the report.

use std::fmt::Write as _;

/// First line of the detail block; its presence marks a real failure.
pub const CHECK_SENTINEL: &str = "# CHECK";

/// Full description of a real divergence between two configurations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub first_label: String,
    pub second_label: String,
    pub first_flags: String,
    pub second_flags: String,
    /// Decoded stdout of the first configuration, after ignored lines were stripped.
    pub first_output: String,
    pub second_output: String,
    pub difference: String,
    /// Last original source pointer seen before the divergence.
    pub source: Option<String>,
    pub source_key: String,
}

impl FailureDetail {
    /// `<first>:<second>` pair of display labels.
    pub fn configs(&self) -> String {
        format!("{}:{}", self.first_label, self.second_label)
    }

    pub fn render(&self) -> String {
        let mut out = render_header(&self.configs(), &self.source_key, "");
        out.push_str("#\n");
        out.push_str(CHECK_SENTINEL);
        out.push_str("\n#\n");
        let _ = writeln!(
            out,
            "# Compared {} with {}",
            self.first_label, self.second_label
        );
        out.push_str("#\n");
        let _ = writeln!(out, "# Flags of {}:", self.first_label);
        let _ = writeln!(out, "{}", self.first_flags);
        let _ = writeln!(out, "# Flags of {}:", self.second_label);
        let _ = writeln!(out, "{}", self.second_flags);
        out.push_str("#\n# Difference:\n");
        let _ = writeln!(out, "{}", self.difference);
        if let Some(source) = &self.source {
            out.push_str("#\n# Source file:\n");
            let _ = writeln!(out, "{source}");
        }
        push_run_output(&mut out, &self.first_label, &self.first_output);
        push_run_output(&mut out, &self.second_label, &self.second_output);
        out
    }
}

/// Header shared by every failure report.
pub fn render_header(configs: &str, source_key: &str, suppression: &str) -> String {
    format!(
        "#\n# Correctness failure\n# configs={configs}\n# source={source_key}\n# suppression={suppression}\n"
    )
}

fn push_run_output(out: &mut String, label: &str, output: &str) {
    out.push_str("#\n");
    let _ = writeln!(out, "### Start of configuration {label}:");
    out.push_str(output);
    if !output.is_empty() && !output.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(out, "### End of configuration {label}");
}
