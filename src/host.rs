//! Interface to the application the exporter is embedded in.

use std::borrow::Cow;
use std::time::SystemTime;

use crate::registry::Label;

/// Point-in-time summary of one live stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    /// Stream path, e.g. `live/camera1`.
    pub name: String,
    /// Current ingest bitrate in bits per second.
    pub bps: u64,
    /// Number of subscribers currently attached.
    pub subscribers: usize,
}

/// The streaming engine seen from the collectors.
///
/// Implementations must be cheap to query; [`Host::streams`] is called once
/// per scrape by the `media` collector.
pub trait Host: std::fmt::Debug + Send + Sync + 'static {
    /// Engine version, e.g. `v4.3.12`.
    fn version(&self) -> &str;

    /// Address the engine is reachable at.
    fn local_ip(&self) -> &str;

    /// Time the engine started.
    fn start_time(&self) -> SystemTime;

    /// Snapshot of the currently published streams.
    fn streams(&self) -> Vec<StreamSummary>;
}

/// [`Host`] for running the exporter on its own, without a streaming engine.
///
/// Reports this crate's version, the time it was created and no streams.
#[derive(Debug, Clone)]
pub struct StandaloneHost {
    version: String,
    local_ip: String,
    start_time: SystemTime,
}

impl StandaloneHost {
    /// Creates a host reachable at `local_ip`, started now.
    pub fn new(local_ip: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            local_ip: local_ip.into(),
            start_time: SystemTime::now(),
        }
    }
}

impl Default for StandaloneHost {
    fn default() -> Self {
        Self::new("127.0.0.1")
    }
}

impl Host for StandaloneHost {
    fn version(&self) -> &str {
        &self.version
    }

    fn local_ip(&self) -> &str {
        &self.local_ip
    }

    fn start_time(&self) -> SystemTime {
        self.start_time
    }

    fn streams(&self) -> Vec<StreamSummary> {
        Vec::new()
    }
}

/// Labels identifying this exporter instance, attached to every metric.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalLabels {
    node_addr: String,
    hostname: String,
}

impl GlobalLabels {
    /// Builds the label set from the configured node address and the
    /// machine's hostname.
    pub fn detect(node_addr: impl Into<String>) -> Self {
        let hostname = sysinfo::System::host_name().unwrap_or_else(|| {
            tracing::error!("failed to read hostname");
            String::new()
        });
        Self::new(node_addr, hostname)
    }

    /// Builds the label set from explicit values.
    pub fn new(node_addr: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            node_addr: node_addr.into(),
            hostname: hostname.into(),
        }
    }

    /// Returns the labels as `(name, value)` pairs.
    pub fn to_labels(&self) -> Vec<Label> {
        vec![
            (Cow::Borrowed("nodeaddr"), Cow::Owned(self.node_addr.clone())),
            (Cow::Borrowed("hostname"), Cow::Owned(self.hostname.clone())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_label_pairs() {
        let labels = GlobalLabels::new("zh_cn", "edge-01").to_labels();
        assert_eq!(
            vec![
                (Cow::Borrowed("nodeaddr"), Cow::Borrowed("zh_cn")),
                (Cow::Borrowed("hostname"), Cow::Borrowed("edge-01")),
            ],
            labels
        );
    }

    #[test]
    fn standalone_host_has_no_streams() {
        let host = StandaloneHost::new("10.0.0.1");
        assert_eq!("10.0.0.1", host.local_ip());
        assert_eq!(env!("CARGO_PKG_VERSION"), host.version());
        assert!(host.streams().is_empty());
    }
}
