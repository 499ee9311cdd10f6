//! Per-testcase configuration narrowing.
//!
//! Some code paths are only reachable, or only comparable, under certain flags
//! or architectures. The testcase content and the baseline output decide which
//! configurations still make sense. Adjustments operate on the caller's owned
//! list and return human-readable change logs.

use tracing::info;

use crate::core::suppression::SuppressionRegistry;
use crate::core::types::Configuration;

/// Number of leading configurations (baseline and primary comparison) that
/// only lose a dropped flag instead of being removed.
const PRIMARY_CONFIGS: usize = 2;

impl SuppressionRegistry {
    /// Drop flags whose content rule matches `testcase`.
    ///
    /// For each `(flag, regex)` rule: if any configuration carries `flag` and
    /// the testcase matches, the flag is removed from the first two
    /// configurations and every further configuration still carrying it is
    /// removed entirely.
    pub fn adjust_configs_by_content(
        &self,
        configs: &mut Vec<Configuration>,
        testcase: &str,
    ) -> Vec<String> {
        let mut logs = Vec::new();
        for rule in &self.drop_flags {
            if !configs.iter().any(|config| config.has_flag(&rule.flag)) {
                continue;
            }
            if !rule.pattern.is_match(testcase) {
                continue;
            }

            for config in configs.iter_mut().take(PRIMARY_CONFIGS) {
                if config.remove_flag(&rule.flag) {
                    logs.push(format!(
                        "Dropped {} from {} based on content rule.",
                        rule.flag,
                        config.display_label()
                    ));
                }
            }

            let mut index = PRIMARY_CONFIGS;
            while index < configs.len() {
                if configs[index].has_flag(&rule.flag) {
                    let removed = configs.remove(index);
                    logs.push(format!(
                        "Removed configuration {} carrying {} based on content rule.",
                        removed.display_label(),
                        rule.flag
                    ));
                } else {
                    index += 1;
                }
            }
        }
        for log in &logs {
            info!("{log}");
        }
        logs
    }

    /// Switch to same-architecture fallbacks when the baseline output says
    /// the testcase cannot be compared across architectures.
    pub fn adjust_configs_by_output(
        &self,
        configs: &mut [Configuration],
        baseline_output: &str,
    ) -> Vec<String> {
        let mut logs = Vec::new();
        if !configs.iter().any(|config| config.fallback.is_some()) {
            return logs;
        }
        let Some(marker) = self
            .fallback_markers
            .iter()
            .find(|rule| rule.pattern.is_match(baseline_output))
        else {
            return logs;
        };

        for config in configs.iter_mut() {
            if let Some(fallback) = config.fallback.take() {
                logs.push(format!(
                    "Replaced {} with {} based on output marker {}.",
                    config.display_label(),
                    fallback.display_label(),
                    marker.id
                ));
                *config = *fallback;
            }
        }
        for log in &logs {
            info!("{log}");
        }
        logs
    }
}
