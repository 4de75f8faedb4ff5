//! Exporter configuration.
//!
//! ```
//! # use stream_exporter::config::ExporterConfig;
//! let config = ExporterConfig::from_toml_str(
//!     r#"
//!     enabled = "[defaults],gpu"
//!
//!     [collector.net]
//!     nic_blacklist = "lo|docker.*"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!("zh_cn", config.node_addr);
//! assert_eq!(
//!     vec!["base", "cpu", "memory", "disk", "net", "media", "gpu"],
//!     config.enabled_collectors()
//! );
//! assert!(config.collector.contains_key("net"));
//! ```

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::collectors::DEFAULT_COLLECTORS;
use crate::error::{Error, Result};

/// Placeholder in [`ExporterConfig::enabled`] standing for
/// [`DEFAULT_COLLECTORS`].
pub const DEFAULTS_PLACEHOLDER: &str = "[defaults]";

/// Top-level configuration of the exporter.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    /// Value of the `nodeaddr` label on every metric.
    pub node_addr: String,
    /// Comma separated collector names, may contain `[defaults]`.
    pub enabled: String,
    /// Log the available collectors at startup.
    pub print_collectors: bool,
    /// First component of every metric name.
    pub namespace: String,
    /// Collect calls slower than this are logged, in milliseconds.
    pub slow_collector_ms: u64,
    /// Export the standard `process_*` metrics (Linux only).
    pub process_metrics: bool,
    /// Per-collector tables, keyed by collector name.
    pub collector: toml::Table,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            node_addr: "zh_cn".to_owned(),
            enabled: DEFAULTS_PLACEHOLDER.to_owned(),
            print_collectors: true,
            namespace: "monibuca".to_owned(),
            slow_collector_ms: 2000,
            process_metrics: true,
            collector: toml::Table::new(),
        }
    }
}

impl ExporterConfig {
    /// Parses a TOML document, filling unset fields with their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The collector names to build, see [`expand_enabled_collectors`].
    pub fn enabled_collectors(&self) -> Vec<String> {
        expand_enabled_collectors(&self.enabled)
    }

    /// The `[collector.<name>]` table, if present. Fails when the entry is
    /// not a table.
    pub fn collector_config(&self, name: &str) -> Result<Option<&toml::Table>> {
        match self.collector.get(name) {
            None => Ok(None),
            Some(toml::Value::Table(table)) => Ok(Some(table)),
            Some(_) => Err(Error::ConfigNotTable {
                collector: name.to_owned(),
            }),
        }
    }

    /// Threshold above which collect calls are logged.
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_collector_ms)
    }
}

/// Expands `[defaults]` to [`DEFAULT_COLLECTORS`], splits on `,`, trims and
/// drops empty entries. Repeated names are kept once, at their first
/// position.
///
/// ```
/// # use stream_exporter::config::expand_enabled_collectors;
/// assert_eq!(
///     vec!["net", "base", "cpu", "memory", "disk", "media"],
///     expand_enabled_collectors(" net, [defaults] ,,")
/// );
/// ```
pub fn expand_enabled_collectors(enabled: &str) -> Vec<String> {
    let expanded = enabled.replace(DEFAULTS_PLACEHOLDER, DEFAULT_COLLECTORS);

    let mut seen = HashSet::new();
    expanded
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .map(str::to_owned)
        .collect()
}
