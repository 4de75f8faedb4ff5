//! Standard `process_*` metrics of the exporter's own process, read from
//! `/proc`.

use std::sync::Arc;

use procfs::process::{LimitValue, Process};

use super::push;
use crate::collector::Collector;
use crate::error::Result;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

/// Name the exporter registers [`ProcessCollector`] under.
pub const NAME: &str = "process";

/// Reads the soft limit, falling back to the hard one; `0` when unlimited.
fn limit(soft: LimitValue, hard: LimitValue) -> u64 {
    match (soft, hard) {
        (LimitValue::Value(soft), _) => soft,
        (LimitValue::Unlimited, LimitValue::Value(hard)) => hard,
        (LimitValue::Unlimited, LimitValue::Unlimited) => 0,
    }
}

/// Collector of the exporter's own process statistics.
#[derive(Debug)]
pub struct ProcessCollector {
    cpu_seconds: Arc<Descriptor>,
    resident_memory: Arc<Descriptor>,
    virtual_memory: Arc<Descriptor>,
    open_fds: Arc<Descriptor>,
    max_fds: Arc<Descriptor>,
    start_time: Arc<Descriptor>,

    page_size: u64,
    ticks_per_second: u64,
}

impl ProcessCollector {
    /// Creates the collector.
    pub fn new() -> Result<Self> {
        let plain = |name: &'static str, help: &'static str| {
            Descriptor::new(name, help, &[], vec![]).map(Arc::new)
        };

        Ok(Self {
            cpu_seconds: plain(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
            )?,
            resident_memory: plain(
                "process_resident_memory_bytes",
                "Resident memory size in bytes.",
            )?,
            virtual_memory: plain("process_virtual_memory_bytes", "Virtual memory size in bytes.")?,
            open_fds: plain("process_open_fds", "Number of open file descriptors.")?,
            max_fds: plain("process_max_fds", "Maximum number of open file descriptors.")?,
            start_time: plain(
                "process_start_time_seconds",
                "Start time of the process since unix epoch in seconds.",
            )?,
            page_size: procfs::page_size(),
            ticks_per_second: procfs::ticks_per_second(),
        })
    }
}

impl Collector for ProcessCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.cpu_seconds.clone(),
            self.resident_memory.clone(),
            self.virtual_memory.clone(),
            self.open_fds.clone(),
            self.max_fds.clone(),
            self.start_time.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(6);

        let process = match Process::myself() {
            Ok(process) => process,
            Err(e) => {
                tracing::debug!(error = %e, "failed to open own process");
                return samples;
            }
        };

        match process.stat() {
            Ok(stat) => {
                let tps = self.ticks_per_second.max(1) as f64;
                push(
                    &mut samples,
                    Sample::counter(
                        &self.cpu_seconds,
                        (stat.utime + stat.stime) as f64 / tps,
                        &[],
                    ),
                );
                push(
                    &mut samples,
                    Sample::gauge(
                        &self.resident_memory,
                        (stat.rss * self.page_size) as f64,
                        &[],
                    ),
                );
                push(
                    &mut samples,
                    Sample::gauge(&self.virtual_memory, stat.vsize as f64, &[]),
                );
                match procfs::boot_time_secs() {
                    Ok(boot) => push(
                        &mut samples,
                        Sample::gauge(
                            &self.start_time,
                            boot as f64 + stat.starttime as f64 / tps,
                            &[],
                        ),
                    ),
                    Err(e) => tracing::debug!(error = %e, "failed to read boot time"),
                }
            }
            Err(e) => tracing::debug!(error = %e, "failed to read process stat"),
        }

        match process.fd_count() {
            Ok(count) => push(&mut samples, Sample::gauge(&self.open_fds, count as f64, &[])),
            Err(e) => tracing::debug!(error = %e, "failed to count open fds"),
        }

        match process.limits() {
            Ok(limits) => {
                let files = limits.max_open_files;
                push(
                    &mut samples,
                    Sample::gauge(
                        &self.max_fds,
                        limit(files.soft_limit, files.hard_limit) as f64,
                        &[],
                    ),
                );
            }
            Err(e) => tracing::debug!(error = %e, "failed to read limits"),
        }

        samples
    }
}
