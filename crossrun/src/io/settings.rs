//! Comparator settings (TOML).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Comparator settings.
///
/// This file is intended to be edited by humans. Missing fields default to
/// values suited for fuzzing sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Wall-clock budget per run of the testcase, in seconds.
    pub timeout_secs: u64,

    /// Wall-clock budget per run of the smoke test, in seconds.
    pub smoke_test_timeout_secs: u64,

    /// Stdout/stderr bytes kept per run.
    pub output_limit_bytes: usize,

    /// Flags passed to every configuration before its own flags.
    pub common_flags: Vec<String>,

    /// Files loaded before the testcase (mocks for nondeterministic builtins).
    pub preamble: Vec<PathBuf>,

    /// Sanity program compared in all configurations before the testcase.
    pub smoke_test: Option<PathBuf>,

    /// Exit codes that do not count as a crash.
    pub non_crash_exit_codes: Vec<i32>,

    pub default_first_config: String,
    pub default_second_config: String,

    /// Replacement for the built-in configuration table.
    pub config_table: Option<PathBuf>,

    /// Replacement for the built-in suppression table.
    pub suppressions: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 3,
            smoke_test_timeout_secs: 1,
            output_limit_bytes: 10_000_000,
            common_flags: Vec::new(),
            preamble: Vec::new(),
            smoke_test: None,
            non_crash_exit_codes: vec![0],
            default_first_config: "interpreter".to_string(),
            default_second_config: "optimizing".to_string(),
            config_table: None,
            suppressions: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.smoke_test_timeout_secs == 0 {
            return Err(anyhow!("smoke_test_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.common_flags.iter().any(|flag| flag.trim().is_empty()) {
            return Err(anyhow!("common_flags must not contain empty flags"));
        }
        if self.default_first_config.trim().is_empty()
            || self.default_second_config.trim().is_empty()
        {
            return Err(anyhow!("default configs must be non-empty"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn smoke_test_timeout(&self) -> Duration {
        Duration::from_secs(self.smoke_test_timeout_secs)
    }

    /// Resolve relative paths against the directory containing the settings file.
    fn resolve_paths(&mut self, base: &Path) {
        for path in &mut self.preamble {
            *path = base.join(&*path);
        }
        for path in [
            &mut self.smoke_test,
            &mut self.config_table,
            &mut self.suppressions,
        ]
        .into_iter()
        .flatten()
        {
            *path = base.join(&*path);
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    if let Some(base) = path.parent() {
        settings.resolve_paths(base);
    }
    Ok(settings)
}
