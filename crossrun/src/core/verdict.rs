//! Stage and verdict types for the comparison state machine.
//!
//! Every pipeline stage returns a [`Stage`]: either the value the next stage
//! needs, or a final [`Verdict`]. Precedence between bailouts follows from the
//! order in which stages are chained, not from early returns buried in helpers.

use serde::{Deserialize, Serialize};

use crate::core::report::{FailureDetail, render_header};
use crate::exit_codes;

/// Result of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage<T> {
    Continue(T),
    Stop(Verdict),
}

/// Final classification of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass(PassReason),
    Fail(Failure),
}

/// Why a comparison passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassReason {
    /// All configurations produced equivalent output.
    Equivalent,
    /// A run timed out before a comparison could be made.
    TimedOut { config: String },
    /// A run crashed and crashes end the comparison.
    Crashed { config: String },
    /// A run crashed but the capped outputs were equivalent.
    CrashedWithoutDifference,
    /// Memory ran out while decoding output.
    ResourceExhausted,
}

/// Why a comparison failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Divergence explained by a known bug.
    Suppressed { bug: String, configs: String },
    /// New divergence with full detail.
    Real(Box<FailureDetail>),
}

/// Coarse outcome, mapped onto process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Trouble,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Pass => exit_codes::PASS,
            Status::Fail => exit_codes::FAIL,
            Status::Trouble => exit_codes::TROUBLE,
        }
    }
}

impl Verdict {
    pub fn suppressed(bug: impl Into<String>, configs: impl Into<String>) -> Self {
        Verdict::Fail(Failure::Suppressed {
            bug: bug.into(),
            configs: configs.into(),
        })
    }

    pub fn status(&self) -> Status {
        match self {
            Verdict::Pass(_) => Status::Pass,
            Verdict::Fail(_) => Status::Fail,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass(_))
    }

    /// Bug id for suppressed failures.
    pub fn suppression(&self) -> Option<&str> {
        match self {
            Verdict::Fail(Failure::Suppressed { bug, .. }) => Some(bug),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&FailureDetail> {
        match self {
            Verdict::Fail(Failure::Real(detail)) => Some(detail),
            _ => None,
        }
    }

    /// Text printed on stdout for downstream tooling.
    pub fn render(&self) -> String {
        match self {
            // Dashed words keep other tools from matching "timeout" or "crash".
            Verdict::Pass(PassReason::TimedOut { config }) => {
                format!("# Correctness - T-I-M-E-O-U-T {config}\n")
            }
            Verdict::Pass(PassReason::Crashed { config }) => {
                format!("# Correctness - C-R-A-S-H {config}\n")
            }
            Verdict::Pass(PassReason::CrashedWithoutDifference) => {
                "# Correctness - C-R-A-S-H\n".to_string()
            }
            Verdict::Pass(PassReason::Equivalent | PassReason::ResourceExhausted) => {
                "# Correctness - pass\n".to_string()
            }
            Verdict::Fail(Failure::Suppressed { bug, configs }) => render_header(configs, "", bug),
            Verdict::Fail(Failure::Real(detail)) => detail.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::CHECK_SENTINEL;

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(Status::Pass.exit_code(), 0);
        assert_ne!(Status::Fail.exit_code(), Status::Trouble.exit_code());
        assert_ne!(Status::Fail.exit_code(), 0);
    }

    #[test]
    fn suppressed_failure_renders_header_only() {
        let verdict = Verdict::suppressed("bug-7", "");
        assert_eq!(verdict.status(), Status::Fail);
        assert_eq!(verdict.suppression(), Some("bug-7"));
        let text = verdict.render();
        assert!(text.contains("# suppression=bug-7"));
        assert!(!text.contains(CHECK_SENTINEL));
    }

    #[test]
    fn pass_renderings_avoid_plain_words() {
        let timeout = Verdict::Pass(PassReason::TimedOut {
            config: "x64,default".to_string(),
        });
        assert!(timeout.render().contains("T-I-M-E-O-U-T x64,default"));
        assert!(!timeout.render().to_lowercase().contains("timeout"));
        assert!(Verdict::Pass(PassReason::Equivalent).is_pass());
    }
}
