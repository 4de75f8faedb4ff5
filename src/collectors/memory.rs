//! System memory.

use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::System;

use super::{descriptor, push};
use crate::collector::{BuildContext, Collector};
use crate::error::Result;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

const SUBSYSTEM: &str = "memory";

const MIB: u64 = 1 << 20;

// Memory is not tied to a mount, the label is kept for dashboards shared
// with the `disk` collector.
const PATH: &str = "/";

/// Memory readings in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Installed memory.
    pub total: u64,
    /// Memory not used for anything.
    pub free: u64,
    /// Memory in use.
    pub used: u64,
}

/// Collector named `memory`.
#[derive(Debug)]
pub struct MemoryCollector {
    total: Arc<Descriptor>,
    free: Arc<Descriptor>,
    used: Arc<Descriptor>,
    used_percent: Arc<Descriptor>,

    system: Mutex<System>,
}

pub(crate) fn build(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
    Ok(Box::new(MemoryCollector::new(ctx.namespace)?))
}

impl MemoryCollector {
    /// Creates the collector.
    pub fn new(namespace: &str) -> Result<Self> {
        let gauge = |name: &str, help: &str| descriptor(namespace, SUBSYSTEM, name, help, &["path"]);

        Ok(Self {
            total: gauge("total", "Total memory in MiB")?,
            free: gauge("free", "Free memory in MiB")?,
            used: gauge("used", "Used memory in MiB")?,
            used_percent: gauge("used_percent", "Used memory in percent")?,
            system: Mutex::new(System::new()),
        })
    }

    /// Turns a memory reading into samples.
    pub fn observe(&self, usage: &MemoryUsage) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(4);
        let labels = [PATH];

        push(
            &mut samples,
            Sample::gauge(&self.free, (usage.free / MIB) as f64, &labels),
        );
        push(
            &mut samples,
            Sample::gauge(&self.used, (usage.used / MIB) as f64, &labels),
        );
        push(
            &mut samples,
            Sample::gauge(&self.total, (usage.total / MIB) as f64, &labels),
        );
        if usage.total > 0 {
            let percent = usage.used as f64 / usage.total as f64 * 100.0;
            push(
                &mut samples,
                Sample::gauge(&self.used_percent, percent, &labels),
            );
        }

        samples
    }
}

impl Collector for MemoryCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.free.clone(),
            self.total.clone(),
            self.used.clone(),
            self.used_percent.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let usage = {
            let mut system = self.system.lock();
            system.refresh_memory();
            MemoryUsage {
                total: system.total_memory(),
                free: system.free_memory(),
                used: system.used_memory(),
            }
        };
        self.observe(&usage)
    }
}
