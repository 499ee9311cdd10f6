//! Declared execution configurations (label → flags).
//!
//! Only labels present in the table can be compared; the comparator never
//! invents flag combinations of its own.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

const BUILTIN_TABLE: &str = include_str!("../../configs/default.toml");

static BUILTIN: LazyLock<ConfigTable> = LazyLock::new(|| {
    ConfigTable::parse(BUILTIN_TABLE).expect("built-in configuration table is valid")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigTable {
    #[serde(default)]
    pub configs: BTreeMap<String, ConfigEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigEntry {
    #[serde(default)]
    pub flags: Vec<String>,
}

impl ConfigTable {
    pub fn builtin() -> &'static ConfigTable {
        &BUILTIN
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let table: ConfigTable = toml::from_str(contents).context("parse configuration table")?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        if self.configs.is_empty() {
            bail!("configuration table must declare at least one config");
        }
        for (label, entry) in &self.configs {
            if label.trim().is_empty() || label.contains([',', ':']) {
                bail!("invalid config label {label:?}");
            }
            if entry.flags.iter().any(|flag| flag.trim().is_empty()) {
                bail!("config {label} has an empty flag");
            }
        }
        Ok(())
    }

    /// Flags declared for `label`.
    pub fn flags(&self, label: &str) -> Result<&[String]> {
        self.configs
            .get(label)
            .map(|entry| entry.flags.as_slice())
            .ok_or_else(|| {
                let known: Vec<&str> = self.configs.keys().map(String::as_str).collect();
                anyhow!("unknown config {label:?} (known: {})", known.join(", "))
            })
    }
}
