//! CPU utilisation and times.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use sysinfo::System;

use super::{descriptor, push};
use crate::collector::{BuildContext, Collector};
use crate::error::Result;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

const SUBSYSTEM: &str = "cpu";

/// `[collector.cpu]` configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CpuConfig {
    /// Report every core instead of the machine-wide total.
    pub per_cpu: bool,
    /// Window usage is measured over, in milliseconds. Collect blocks for
    /// this long while holding the collector's stats handle, so concurrent
    /// scrapes of `cpu` are served one after the other.
    pub sample_window_ms: u64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            per_cpu: false,
            sample_window_ms: 1000,
        }
    }
}

/// Cumulative times of one CPU (or all of them), in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    /// Time spent in user mode.
    pub user: u64,
    /// Time spent in kernel mode.
    pub system: u64,
    /// Time spent idle.
    pub idle: u64,
}

/// `core` label value: `cpu-total`, or `cpu-<index>` for a single core.
fn core_label(index: Option<usize>) -> String {
    match index {
        Some(i) => format!("cpu-{i}"),
        None => "cpu-total".to_owned(),
    }
}

#[cfg(target_os = "linux")]
fn read_times(per_cpu: bool) -> Vec<(Option<usize>, CpuTimes)> {
    use procfs::{CurrentSI, KernelStats};

    let stats = match KernelStats::current() {
        Ok(stats) => stats,
        Err(e) => {
            tracing::debug!(error = %e, "failed to read kernel stats");
            return Vec::new();
        }
    };

    if per_cpu {
        stats
            .cpu_time
            .iter()
            .enumerate()
            .map(|(i, cpu)| {
                let times = CpuTimes {
                    user: cpu.user,
                    system: cpu.system,
                    idle: cpu.idle,
                };
                (Some(i), times)
            })
            .collect()
    } else {
        let total = CpuTimes {
            user: stats.total.user,
            system: stats.total.system,
            idle: stats.total.idle,
        };
        vec![(None, total)]
    }
}

#[cfg(not(target_os = "linux"))]
fn read_times(_per_cpu: bool) -> Vec<(Option<usize>, CpuTimes)> {
    Vec::new()
}

/// Collector named `cpu`.
#[derive(Debug)]
pub struct CpuCollector {
    usage: Arc<Descriptor>,
    user_time: Arc<Descriptor>,
    system_time: Arc<Descriptor>,
    idle_time: Arc<Descriptor>,

    per_cpu: bool,
    window: Duration,

    system: Mutex<System>,
}

pub(crate) fn build(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
    let config: CpuConfig = ctx.config()?;
    Ok(Box::new(CpuCollector::new(ctx.namespace, &config)?))
}

impl CpuCollector {
    /// Creates the collector.
    pub fn new(namespace: &str, config: &CpuConfig) -> Result<Self> {
        let by_core = |name: &str, help: &str| descriptor(namespace, SUBSYSTEM, name, help, &["core"]);

        Ok(Self {
            usage: by_core("usage", "CPU utilisation in percent")?,
            user_time: by_core("user_time", "CPU time spent in user mode, in jiffies")?,
            system_time: by_core("system_time", "CPU time spent in kernel mode, in jiffies")?,
            idle_time: by_core("idle_time", "CPU time spent idle, in jiffies")?,
            per_cpu: config.per_cpu,
            window: Duration::from_millis(config.sample_window_ms),
            system: Mutex::new(System::new()),
        })
    }

    /// Measures utilisation over the configured window.
    fn measure_usage(&self) -> Vec<(Option<usize>, f64)> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        std::thread::sleep(self.window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        system.refresh_cpu_all();

        if self.per_cpu {
            system
                .cpus()
                .iter()
                .enumerate()
                .map(|(i, cpu)| (Some(i), f64::from(cpu.cpu_usage())))
                .collect()
        } else {
            vec![(None, f64::from(system.global_cpu_usage()))]
        }
    }

    /// Turns utilisation and time readings into samples.
    pub fn observe(
        &self,
        usage: &[(Option<usize>, f64)],
        times: &[(Option<usize>, CpuTimes)],
    ) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(usage.len() + times.len() * 3);

        for (core, percent) in usage {
            let label = core_label(*core);
            push(
                &mut samples,
                Sample::gauge(&self.usage, *percent, &[label.as_str()]),
            );
        }

        for (core, cpu) in times {
            let label = core_label(*core);
            let labels = [label.as_str()];
            push(
                &mut samples,
                Sample::gauge(&self.user_time, cpu.user as f64, &labels),
            );
            push(
                &mut samples,
                Sample::gauge(&self.system_time, cpu.system as f64, &labels),
            );
            push(
                &mut samples,
                Sample::gauge(&self.idle_time, cpu.idle as f64, &labels),
            );
        }

        samples
    }
}

impl Collector for CpuCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.user_time.clone(),
            self.usage.clone(),
            self.system_time.clone(),
            self.idle_time.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let usage = self.measure_usage();
        let times = read_times(self.per_cpu);
        self.observe(&usage, &times)
    }
}
