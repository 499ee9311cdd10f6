//! Command-line surface of the `crossrun` binary.
//!
//! Parses arguments, loads settings and rule tables, builds the
//! configurations to compare and hands them to the [`Comparator`].

use std::fmt;
use std::fs;
use std::path::{self, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, instrument};

use crate::compare::{Comparator, ComparisonPlan, CrashPolicy, Outcome, testcase_dir};
use crate::core::config_table::ConfigTable;
use crate::core::source_key::SMOKE_TEST_SOURCE_KEY;
use crate::core::types::Configuration;
use crate::io::runner::ProcessRunner;
use crate::io::settings::{Settings, load_settings};
use crate::io::tables::{load_config_table, load_suppressions};

/// Suppression tag printed for invalid invocations.
pub const WRONG_USAGE: &str = "wrong_usage";
/// Suppression tag printed when the comparison itself broke.
pub const INTERNAL_ERROR: &str = "internal_error";

pub const SUPPORTED_ARCHS: [&str; 8] = [
    "android_arm",
    "android_arm64",
    "arm",
    "arm64",
    "ia32",
    "mips",
    "mips64",
    "x64",
];

#[derive(Debug, Parser)]
#[command(
    name = "crossrun",
    version,
    about = "Run one testcase under several engine configurations and compare the output"
)]
pub struct Cli {
    /// Settings file (TOML). A missing file means defaults.
    #[arg(long, default_value = "crossrun.toml")]
    pub settings: PathBuf,

    /// Suppression table replacing the built-in one.
    #[arg(long)]
    pub suppressions: Option<PathBuf>,

    /// Disable known-bug suppressions (normalization stays active).
    #[arg(long)]
    pub skip_suppressions: bool,

    /// Skip the smoke test named in the settings.
    #[arg(long)]
    pub skip_smoke_test: bool,

    /// Seed passed to every configuration as `--random-seed=N`.
    #[arg(long, default_value_t = 12345, allow_negative_numbers = true)]
    pub random_seed: i64,

    /// Baseline configuration label (defaults to the settings value).
    #[arg(long)]
    pub first_config: Option<String>,

    /// Comparison configuration label (defaults to the settings value).
    #[arg(long)]
    pub second_config: Option<String>,

    #[arg(long, default_value = "d8")]
    pub first_executable: PathBuf,

    /// Defaults to the first executable.
    #[arg(long)]
    pub second_executable: Option<PathBuf>,

    #[arg(long, default_value = "x64", value_parser = SUPPORTED_ARCHS)]
    pub first_arch: String,

    /// Defaults to the first architecture.
    #[arg(long, value_parser = SUPPORTED_ARCHS)]
    pub second_arch: Option<String>,

    /// Extra flag for the baseline configuration (repeatable).
    #[arg(long, allow_hyphen_values = true)]
    pub first_config_extra_flags: Vec<String>,

    /// Extra flag for the comparison configuration (repeatable).
    #[arg(long, allow_hyphen_values = true)]
    pub second_config_extra_flags: Vec<String>,

    /// Additional configuration compared against the baseline on the second
    /// executable (repeatable).
    #[arg(long)]
    pub extra_config: Vec<String>,

    #[arg(long, value_enum, default_value_t = CrashPolicyArg::Bailout)]
    pub crash_policy: CrashPolicyArg,

    /// Write a JSON summary of the outcome to this file.
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Program to compare.
    pub testcase: PathBuf,
}

/// Crash handling selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CrashPolicyArg {
    /// Crashes end the comparison as a pass.
    Bailout,
    /// Crashed runs are still compared.
    Compare,
}

impl From<CrashPolicyArg> for CrashPolicy {
    fn from(arg: CrashPolicyArg) -> Self {
        match arg {
            CrashPolicyArg::Bailout => CrashPolicy::Bailout,
            CrashPolicyArg::Compare => CrashPolicy::Compare,
        }
    }
}

/// Invalid invocation detected after argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

fn usage(message: impl Into<String>) -> anyhow::Error {
    UsageError(message.into()).into()
}

/// Load everything the invocation names and run the comparison.
#[instrument(skip_all, fields(testcase = %cli.testcase.display()))]
pub fn run(cli: &Cli) -> Result<Outcome> {
    let settings = load_settings(&cli.settings)?;
    let table = load_config_table(settings.config_table.as_deref())?;
    let suppressions = cli
        .suppressions
        .as_deref()
        .or(settings.suppressions.as_deref());
    let registry = load_suppressions(suppressions, cli.skip_suppressions)?;
    let configs = build_configs(cli, &settings, &table)?;

    let testcase_path = fs::canonicalize(&cli.testcase)
        .map_err(|err| usage(format!("testcase {}: {err}", cli.testcase.display())))?;
    let bytes = fs::read(&testcase_path)
        .with_context(|| format!("read testcase {}", testcase_path.display()))?;
    let testcase = String::from_utf8_lossy(&bytes);

    // The engine runs inside the testcase directory.
    let preamble = settings
        .preamble
        .iter()
        .map(|file| path::absolute(file).with_context(|| format!("resolve {}", file.display())))
        .collect::<Result<Vec<_>>>()?;
    let smoke = match (&settings.smoke_test, cli.skip_smoke_test) {
        (Some(smoke_test), false) => {
            let smoke_test = path::absolute(smoke_test)
                .with_context(|| format!("resolve {}", smoke_test.display()))?;
            Some(
                ComparisonPlan::new(smoke_test, settings.smoke_test_timeout())
                    .with_crash_policy(CrashPolicy::Fail)
                    .with_source_key(SMOKE_TEST_SOURCE_KEY),
            )
        }
        _ => None,
    };
    let plan = ComparisonPlan::new(&testcase_path, settings.timeout())
        .with_crash_policy(cli.crash_policy.into());

    let runner = ProcessRunner {
        output_limit_bytes: settings.output_limit_bytes,
        non_crash_exit_codes: settings.non_crash_exit_codes.clone(),
    };
    Comparator::new(&registry, &runner, testcase_dir(&testcase_path))
        .with_preamble(preamble)
        .compare(configs, &testcase, &plan, smoke.as_ref())
}

/// Build the baseline, the comparison and any extra configurations.
///
/// Flags are ordered: random seed, common flags, table flags, extra flags.
/// A comparison on another executable and architecture gets a fallback with
/// the same flags on the baseline executable and architecture.
pub fn build_configs(
    cli: &Cli,
    settings: &Settings,
    table: &ConfigTable,
) -> Result<Vec<Configuration>> {
    if cli.random_seed == 0 {
        return Err(usage("--random-seed must be non-zero"));
    }
    let first_label = cli
        .first_config
        .as_deref()
        .unwrap_or(&settings.default_first_config);
    let second_label = cli
        .second_config
        .as_deref()
        .unwrap_or(&settings.default_second_config);
    let first_executable = &cli.first_executable;
    let second_executable = cli.second_executable.as_ref().unwrap_or(first_executable);
    let first_arch = cli.first_arch.as_str();
    let second_arch = cli.second_arch.as_deref().unwrap_or(first_arch);

    if first_label == second_label
        && first_executable == second_executable
        && cli.first_config_extra_flags == cli.second_config_extra_flags
    {
        return Err(usage(
            "need either an executable or a configuration difference",
        ));
    }

    let flags = |label: &str, extra: &[String]| -> Result<Vec<String>> {
        let declared = table.flags(label).map_err(|err| usage(err.to_string()))?;
        let mut flags = Vec::with_capacity(1 + settings.common_flags.len() + declared.len());
        flags.push(format!("--random-seed={}", cli.random_seed));
        flags.extend(settings.common_flags.iter().cloned());
        flags.extend(declared.iter().cloned());
        flags.extend(extra.iter().cloned());
        Ok(flags)
    };
    let on_second = |label: &str, extra: &[String]| -> Result<Configuration> {
        let flags = flags(label, extra)?;
        let config = Configuration::new(label, second_arch, second_executable, flags.clone());
        if second_arch != first_arch && second_executable != first_executable {
            return Ok(config.with_fallback(Configuration::new(
                label,
                first_arch,
                first_executable,
                flags,
            )));
        }
        Ok(config)
    };

    let mut configs = vec![
        Configuration::new(
            first_label,
            first_arch,
            first_executable,
            flags(first_label, &cli.first_config_extra_flags)?,
        ),
        on_second(second_label, &cli.second_config_extra_flags)?,
    ];
    for label in &cli.extra_config {
        configs.push(on_second(label, &[])?);
    }
    debug!(
        configs = ?configs.iter().map(Configuration::display_label).collect::<Vec<_>>(),
        "built configurations"
    );
    Ok(configs)
}
