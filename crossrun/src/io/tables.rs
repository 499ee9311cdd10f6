//! Loading configuration and suppression tables from disk.
//!
//! Without an explicit file the embedded defaults are used; those are
//! compiled once per process and shared.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::config_table::ConfigTable;
use crate::core::suppression::{SuppressionRegistry, SuppressionTable};

pub fn load_config_table(path: Option<&Path>) -> Result<Cow<'static, ConfigTable>> {
    let Some(path) = path else {
        return Ok(Cow::Borrowed(ConfigTable::builtin()));
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let table = ConfigTable::parse(&contents).with_context(|| format!("load {}", path.display()))?;
    debug!(path = %path.display(), configs = table.configs.len(), "loaded configuration table");
    Ok(Cow::Owned(table))
}

/// Load suppressions, optionally with suppression rules disabled.
pub fn load_suppressions(
    path: Option<&Path>,
    skip_suppressions: bool,
) -> Result<Cow<'static, SuppressionRegistry>> {
    let registry = match path {
        None => Cow::Borrowed(SuppressionRegistry::builtin()),
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            let registry = SuppressionTable::parse(&contents)
                .and_then(|table| table.compile())
                .with_context(|| format!("load {}", path.display()))?;
            debug!(path = %path.display(), "loaded suppression table");
            Cow::Owned(registry)
        }
    };
    if skip_suppressions {
        return Ok(Cow::Owned(registry.without_suppressions()));
    }
    Ok(registry)
}
