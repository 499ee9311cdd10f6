//! Machine-readable comparison summary (`--summary FILE`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::verdict::{Failure, PassReason, Status, Verdict};

/// One comparison outcome, written as JSON next to the textual report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComparisonSummary {
    pub status: Status,
    /// Short reason tag (`equivalent`, `timeout`, `crash`, `suppressed`, `difference`, ...).
    pub reason: String,
    /// `<first>:<second>` display labels, when known.
    pub configs: Option<String>,
    pub source_key: Option<String>,
    pub suppression: Option<String>,
    pub difference: Option<String>,
}

impl ComparisonSummary {
    pub fn from_verdict(verdict: &Verdict) -> Self {
        let mut summary = Self {
            status: verdict.status(),
            reason: String::new(),
            configs: None,
            source_key: None,
            suppression: None,
            difference: None,
        };
        summary.reason = match verdict {
            Verdict::Pass(PassReason::Equivalent) => "equivalent",
            Verdict::Pass(PassReason::TimedOut { config }) => {
                summary.configs = Some(config.clone());
                "timeout"
            }
            Verdict::Pass(PassReason::Crashed { config }) => {
                summary.configs = Some(config.clone());
                "crash"
            }
            Verdict::Pass(PassReason::CrashedWithoutDifference) => "crash_without_difference",
            Verdict::Pass(PassReason::ResourceExhausted) => "resource_exhausted",
            Verdict::Fail(Failure::Suppressed { bug, configs }) => {
                summary.suppression = Some(bug.clone());
                summary.configs = Some(configs.clone()).filter(|configs| !configs.is_empty());
                "suppressed"
            }
            Verdict::Fail(Failure::Real(detail)) => {
                summary.configs = Some(detail.configs());
                summary.source_key = Some(detail.source_key.clone());
                summary.difference = Some(detail.difference.clone());
                "difference"
            }
        }
        .to_string();
        summary
    }

    /// Summary for runs that never produced a verdict.
    pub fn trouble(reason: &str) -> Self {
        Self {
            status: Status::Trouble,
            reason: reason.to_string(),
            configs: None,
            source_key: None,
            suppression: Some(reason.to_string()),
            difference: None,
        }
    }
}

/// Atomically write a summary to disk (temp file + rename).
pub fn write_summary(path: &Path, summary: &ComparisonSummary) -> Result<()> {
    debug!(path = %path.display(), status = ?summary.status, "writing summary");
    let mut buf = serde_json::to_string_pretty(summary).context("serialize summary")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp summary {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace summary {}", path.display()))?;
    Ok(())
}
