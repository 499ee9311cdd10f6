//! Orchestration of one differential comparison.
//!
//! Runs the baseline and every comparison configuration on the same testcase
//! and chains the bailout stages. Each stage yields a [`Stage`]; the first
//! `Stop` decides the verdict.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::decode::decode_output;
use crate::core::report::FailureDetail;
use crate::core::source_key::source_key;
use crate::core::suppression::SuppressionRegistry;
use crate::core::types::{Configuration, ExecutionResult};
use crate::core::verdict::{Failure, PassReason, Stage, Verdict};
use crate::io::runner::{RunRequest, Runner};

/// Bug id reported when a crash is not allowed and no difference explains it.
pub const UNEXPECTED_CRASH: &str = "unexpected crash";

/// How crashed runs are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrashPolicy {
    /// A crash ends the comparison as a pass before any diffing.
    #[default]
    Bailout,
    /// Crashed runs are capped and diffed like any other run.
    Compare,
    /// Like `Compare`, but a crash without a difference fails.
    Fail,
}

/// Parameters for comparing one program.
#[derive(Debug, Clone)]
pub struct ComparisonPlan {
    pub testcase: PathBuf,
    pub timeout: Duration,
    pub crash_policy: CrashPolicy,
    /// Fixed source key for every failure of this plan.
    pub source_key: Option<String>,
}

impl ComparisonPlan {
    pub fn new(testcase: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            testcase: testcase.into(),
            timeout,
            crash_policy: CrashPolicy::default(),
            source_key: None,
        }
    }

    pub fn with_crash_policy(mut self, crash_policy: CrashPolicy) -> Self {
        self.crash_policy = crash_policy;
        self
    }

    pub fn with_source_key(mut self, source_key: impl Into<String>) -> Self {
        self.source_key = Some(source_key.into());
        self
    }
}

/// Verdict plus the configuration changes made along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub log: Vec<String>,
}

/// Drives runs through a [`Runner`] and classifies the result.
pub struct Comparator<'a, R: Runner> {
    registry: &'a SuppressionRegistry,
    runner: &'a R,
    preamble: Vec<PathBuf>,
    cwd: PathBuf,
}

impl<'a, R: Runner> Comparator<'a, R> {
    pub fn new(registry: &'a SuppressionRegistry, runner: &'a R, cwd: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            runner,
            preamble: Vec::new(),
            cwd: cwd.into(),
        }
    }

    /// Files passed to the engine before the testcase.
    pub fn with_preamble(mut self, preamble: Vec<PathBuf>) -> Self {
        self.preamble = preamble;
        self
    }

    /// Compare `configs` on the testcase described by `plan`.
    ///
    /// `testcase` is the program text, used for content rules. When `smoke`
    /// is given, that plan runs first with the adjusted configurations and
    /// any verdict other than a pass ends the comparison.
    #[instrument(skip_all, fields(testcase = %plan.testcase.display(), configs = configs.len()))]
    pub fn compare(
        &self,
        mut configs: Vec<Configuration>,
        testcase: &str,
        plan: &ComparisonPlan,
        smoke: Option<&ComparisonPlan>,
    ) -> Result<Outcome> {
        let mut log = Vec::new();
        if let Stage::Stop(verdict) = self.content_bailout(testcase) {
            info!(suppression = ?verdict.suppression(), "testcase suppressed by content");
            return Ok(Outcome { verdict, log });
        }

        log.extend(self.registry.adjust_configs_by_content(&mut configs, testcase));

        if let Some(smoke) = smoke {
            let verdict = self
                .run_comparisons(configs.clone(), smoke, &mut log)
                .context("smoke test")?;
            if !verdict.is_pass() {
                warn!("smoke test failed");
                return Ok(Outcome { verdict, log });
            }
            debug!("smoke test passed");
        }

        let verdict = self.run_comparisons(configs, plan, &mut log)?;
        info!(status = ?verdict.status(), "comparison finished");
        Ok(Outcome { verdict, log })
    }

    /// Run the baseline and each further configuration, comparing every
    /// output against the baseline.
    pub fn run_comparisons(
        &self,
        mut configs: Vec<Configuration>,
        plan: &ComparisonPlan,
        log: &mut Vec<String>,
    ) -> Result<Verdict> {
        if configs.len() < 2 {
            bail!(
                "at least two configurations are needed, got {}",
                configs.len()
            );
        }
        let policy = plan.crash_policy;

        // The baseline already ran when its output picks the fallbacks, so it
        // keeps the configuration it ran with.
        let baseline_config = configs[0].clone();
        let mut baseline = self.run(&baseline_config, plan)?;
        if let Stage::Stop(verdict) = pass_bailout(&baseline_config, &baseline, policy) {
            return Ok(verdict);
        }

        let adjusted = match decode_output(&baseline.stdout) {
            Ok(text) => self.registry.adjust_configs_by_output(&mut configs, &text),
            Err(_) => return Ok(Verdict::Pass(PassReason::ResourceExhausted)),
        };
        log.extend(adjusted);

        baseline.strip_ignored(self.registry.normalizer());
        let mut crashed = baseline.crashed;

        for config in &configs[1..] {
            let mut result = self.run(config, plan)?;
            if let Stage::Stop(verdict) = pass_bailout(config, &result, policy) {
                return Ok(verdict);
            }
            crashed |= result.crashed;
            result.strip_ignored(self.registry.normalizer());

            let detail =
                match self.compare_pair(&baseline_config, &baseline, config, &result, plan) {
                    Stage::Stop(verdict) => return Ok(verdict),
                    Stage::Continue(None) => continue,
                    Stage::Continue(Some(detail)) => detail,
                };

            let detail = match config.fallback.as_deref() {
                Some(fallback) => self
                    .prefer_fallback(&baseline_config, &baseline, fallback, plan)?
                    .unwrap_or(detail),
                None => detail,
            };
            return Ok(Verdict::Fail(Failure::Real(Box::new(detail))));
        }

        if crashed {
            return Ok(match policy {
                CrashPolicy::Fail => Verdict::suppressed(UNEXPECTED_CRASH, ""),
                CrashPolicy::Bailout | CrashPolicy::Compare => {
                    Verdict::Pass(PassReason::CrashedWithoutDifference)
                }
            });
        }
        Ok(Verdict::Pass(PassReason::Equivalent))
    }

    /// Bail out if the testcase's sources or content match a known bug.
    pub fn content_bailout(&self, testcase: &str) -> Stage<()> {
        let metadata = self.registry.metadata(testcase);
        if let Some(bug) = self.registry.ignore_by_metadata(&metadata) {
            return Stage::Stop(Verdict::suppressed(bug, ""));
        }
        if let Some(bug) = self.registry.ignore_by_content(testcase) {
            return Stage::Stop(Verdict::suppressed(bug, ""));
        }
        Stage::Continue(())
    }

    /// Bail out if either output of a differing pair matches an output rule.
    pub fn fail_bailout(
        &self,
        first: (&Configuration, &str),
        second: (&Configuration, &str),
    ) -> Stage<()> {
        let configs = format!(
            "{}:{}",
            first.0.display_label(),
            second.0.display_label()
        );
        for (config, output) in [first, second] {
            if let Some(bug) = self.registry.ignore_by_output(config, output) {
                debug!(bug, config = %config.display_label(), "difference suppressed by output");
                return Stage::Stop(Verdict::suppressed(bug, configs));
            }
        }
        Stage::Continue(())
    }

    /// Diff two stripped runs.
    ///
    /// Continues with `None` when equivalent and with the failure detail when
    /// an unsuppressed difference was found.
    fn compare_pair(
        &self,
        first_config: &Configuration,
        first: &ExecutionResult,
        second_config: &Configuration,
        second: &ExecutionResult,
        plan: &ComparisonPlan,
    ) -> Stage<Option<FailureDetail>> {
        let exhausted = || Stage::Stop(Verdict::Pass(PassReason::ResourceExhausted));
        let Ok(diff) = self.registry.diff(first, second) else {
            return exhausted();
        };
        let Some(difference) = diff.difference else {
            return Stage::Continue(None);
        };
        let (Ok(first_output), Ok(second_output)) =
            (decode_output(&first.stdout), decode_output(&second.stdout))
        else {
            return exhausted();
        };

        if let Stage::Stop(verdict) = self.fail_bailout(
            (first_config, &*first_output),
            (second_config, &*second_output),
        ) {
            return Stage::Stop(verdict);
        }

        let source_key = plan.source_key.clone().unwrap_or_else(|| {
            source_key(diff.source.as_deref(), self.registry.known_failures())
        });
        Stage::Continue(Some(FailureDetail {
            first_label: first_config.display_label(),
            second_label: second_config.display_label(),
            first_flags: first_config.flags_line(),
            second_flags: second_config.flags_line(),
            first_output: first_output.into_owned(),
            second_output: second_output.into_owned(),
            difference,
            source: diff.source,
            source_key,
        }))
    }

    /// Re-run a differing comparison with its same-architecture fallback.
    ///
    /// Returns the fallback pair's detail if it differs too. Inconclusive,
    /// suppressed or equivalent fallback runs keep the original report.
    fn prefer_fallback(
        &self,
        baseline_config: &Configuration,
        baseline: &ExecutionResult,
        fallback: &Configuration,
        plan: &ComparisonPlan,
    ) -> Result<Option<FailureDetail>> {
        debug!(fallback = %fallback.display_label(), "re-running difference on fallback");
        let mut result = self.run(fallback, plan)?;
        if result.is_inconclusive() {
            return Ok(None);
        }
        result.strip_ignored(self.registry.normalizer());
        match self.compare_pair(baseline_config, baseline, fallback, &result, plan) {
            Stage::Continue(detail) => Ok(detail),
            Stage::Stop(_) => Ok(None),
        }
    }

    fn run(&self, config: &Configuration, plan: &ComparisonPlan) -> Result<ExecutionResult> {
        let request = RunRequest {
            argv: config.argv(&self.preamble, &plan.testcase),
            cwd: self.cwd.clone(),
            timeout: plan.timeout,
        };
        debug!(config = %config.display_label(), "running configuration");
        self.runner
            .run(&request)
            .with_context(|| format!("run {}", config.display_label()))
    }
}

/// Bail out as a pass on timeouts, and on crashes when the policy says so.
pub fn pass_bailout(
    config: &Configuration,
    result: &ExecutionResult,
    policy: CrashPolicy,
) -> Stage<()> {
    if result.timed_out {
        warn!(config = %config.display_label(), "run timed out");
        return Stage::Stop(Verdict::Pass(PassReason::TimedOut {
            config: config.display_label(),
        }));
    }
    if result.crashed && policy == CrashPolicy::Bailout {
        info!(config = %config.display_label(), "run crashed");
        return Stage::Stop(Verdict::Pass(PassReason::Crashed {
            config: config.display_label(),
        }));
    }
    Stage::Continue(())
}

/// Directory a testcase runs in: its parent, or the current directory.
pub fn testcase_dir(testcase: &Path) -> PathBuf {
    match testcase.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
