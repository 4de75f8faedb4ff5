//! Per-interface network traffic.
//!
//! Raw interface counters are exported as-is; receive and send speeds are
//! derived from consecutive scrapes through a [`RateTracker`] per direction.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use sysinfo::Networks;

use super::{descriptor, push};
use crate::collector::{BuildContext, Collector};
use crate::error::{Error, Result};
use crate::metrics::sample::Sample;
use crate::rate::RateTracker;
use crate::registry::Descriptor;

const SUBSYSTEM: &str = "net";

/// `[collector.net]` configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetConfig {
    /// Interfaces to report, anchored regular expression.
    pub nic_whitelist: String,
    /// Interfaces to skip, anchored regular expression. Checked first.
    pub nic_blacklist: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            nic_whitelist: ".*".to_owned(),
            nic_blacklist: String::new(),
        }
    }
}

/// Cumulative counters of one interface as reported by the OS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceCounters {
    /// Interface name.
    pub name: String,
    /// Bytes received.
    pub bytes_recv: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Packets received.
    pub packets_recv: u64,
    /// Packets sent.
    pub packets_sent: u64,
    /// Receive errors.
    pub errors_in: u64,
    /// Send errors.
    pub errors_out: u64,
}

#[derive(Debug, Default)]
struct Speeds {
    received: RateTracker<String>,
    sent: RateTracker<String>,
}

/// Collector named `net`.
#[derive(Debug)]
pub struct NetworkCollector {
    bytes_received_total: Arc<Descriptor>,
    bytes_sent_total: Arc<Descriptor>,
    bytes_total: Arc<Descriptor>,

    bytes_received_speed: Arc<Descriptor>,
    bytes_sent_speed: Arc<Descriptor>,

    packets_received_total: Arc<Descriptor>,
    packets_sent_total: Arc<Descriptor>,
    packets_total: Arc<Descriptor>,

    errors_in: Arc<Descriptor>,
    errors_out: Arc<Descriptor>,
    errors_total: Arc<Descriptor>,

    whitelist: Regex,
    blacklist: Regex,

    speeds: Mutex<Speeds>,
}

pub(crate) fn build(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
    let config: NetConfig = ctx.config()?;
    Ok(Box::new(NetworkCollector::new(ctx.namespace, &config)?))
}

fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_owned(),
        source,
    })
}

impl NetworkCollector {
    /// Creates the collector, compiling the interface filters.
    pub fn new(namespace: &str, config: &NetConfig) -> Result<Self> {
        let counter = |name: &str, help: &str| descriptor(namespace, SUBSYSTEM, name, help, &["nic"]);

        Ok(Self {
            bytes_received_total: counter("bytes_received_total", "Bytes received")?,
            bytes_sent_total: counter("bytes_sent_total", "Bytes sent")?,
            bytes_total: counter("bytes_total", "Bytes received and sent")?,
            bytes_received_speed: counter(
                "bytes_received_speed",
                "Receive speed in bytes per second",
            )?,
            bytes_sent_speed: counter("bytes_sent_speed", "Send speed in bytes per second")?,
            packets_received_total: counter("packets_received_total", "Packets received")?,
            packets_sent_total: counter("packets_sent_total", "Packets sent")?,
            packets_total: counter("packets_total", "Packets received and sent")?,
            errors_in: counter("packets_received_errors_total", "Receive errors")?,
            errors_out: counter("packets_sent_errors_total", "Send errors")?,
            errors_total: counter("packets_errors_total", "Receive and send errors")?,
            whitelist: anchored(&config.nic_whitelist)?,
            blacklist: anchored(&config.nic_blacklist)?,
            speeds: Mutex::new(Speeds::default()),
        })
    }

    fn is_reported(&self, nic: &str) -> bool {
        !self.blacklist.is_match(nic) && self.whitelist.is_match(nic)
    }

    /// Turns one round of interface counters observed at `now` into samples,
    /// updating the speed trackers.
    pub fn observe(&self, interfaces: &[InterfaceCounters], now: Instant) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(interfaces.len() * 11);
        let mut speeds = self.speeds.lock();

        for nic in interfaces.iter().filter(|nic| self.is_reported(&nic.name)) {
            let labels = [nic.name.as_str()];
            let counters = [
                (&self.bytes_received_total, nic.bytes_recv),
                (&self.bytes_sent_total, nic.bytes_sent),
                (&self.bytes_total, nic.bytes_recv.wrapping_add(nic.bytes_sent)),
                (&self.packets_received_total, nic.packets_recv),
                (&self.packets_sent_total, nic.packets_sent),
                (
                    &self.packets_total,
                    nic.packets_recv.wrapping_add(nic.packets_sent),
                ),
                (&self.errors_in, nic.errors_in),
                (&self.errors_out, nic.errors_out),
                (&self.errors_total, nic.errors_in.wrapping_add(nic.errors_out)),
            ];
            for (desc, value) in counters {
                push(&mut samples, Sample::counter(desc, value as f64, &labels));
            }

            let received = speeds.received.observe(nic.name.clone(), nic.bytes_recv, now);
            if let Some(rate) = received {
                push(
                    &mut samples,
                    Sample::gauge(&self.bytes_received_speed, rate, &labels),
                );
            }
            let sent = speeds.sent.observe(nic.name.clone(), nic.bytes_sent, now);
            if let Some(rate) = sent {
                push(&mut samples, Sample::gauge(&self.bytes_sent_speed, rate, &labels));
            }
        }

        samples
    }
}

fn read_interfaces() -> Vec<InterfaceCounters> {
    Networks::new_with_refreshed_list()
        .iter()
        .map(|(name, data)| InterfaceCounters {
            name: name.clone(),
            bytes_recv: data.total_received(),
            bytes_sent: data.total_transmitted(),
            packets_recv: data.total_packets_received(),
            packets_sent: data.total_packets_transmitted(),
            errors_in: data.total_errors_on_received(),
            errors_out: data.total_errors_on_transmitted(),
        })
        .collect()
}

impl Collector for NetworkCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.bytes_received_total.clone(),
            self.bytes_sent_total.clone(),
            self.bytes_total.clone(),
            self.bytes_received_speed.clone(),
            self.bytes_sent_speed.clone(),
            self.packets_total.clone(),
            self.packets_received_total.clone(),
            self.packets_sent_total.clone(),
            self.errors_in.clone(),
            self.errors_out.clone(),
            self.errors_total.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let interfaces = read_interfaces();
        self.observe(&interfaces, Instant::now())
    }
}
