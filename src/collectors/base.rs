//! Uptime, own process usage and build information.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;

use super::{descriptor, descriptor_with_const_labels, push};
use crate::collector::{BuildContext, Collector};
use crate::error::Result;
use crate::host::Host;
use crate::metrics::sample::Sample;
use crate::rate::RateTracker;
use crate::registry::Descriptor;

const SUBSYSTEM: &str = "base";

const MIB: u64 = 1 << 20;

/// Converts a `v<major>.<minor>.<patch>` version to `major + minor / 100 +
/// patch / 100^2 + ...`.
///
/// Any malformed component makes the whole version `0.0`.
///
/// ```
/// # use stream_exporter::collectors::base::version_to_float;
/// assert!((version_to_float("v4.3.12") - 4.0312).abs() < 1e-9);
/// assert_eq!(0.0, version_to_float("v4.x"));
/// ```
pub fn version_to_float(version: &str) -> f64 {
    let stripped = version.replace('v', "");
    let mut value = 0.0;
    for (i, part) in stripped.split('.').enumerate() {
        match part.parse::<u32>() {
            Ok(n) => value += f64::from(n) / 100f64.powi(i as i32),
            Err(_) => {
                tracing::warn!(%version, "malformed version");
                return 0.0;
            }
        }
    }
    value
}

/// Resource usage of the exporter's own process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessUsage {
    /// Resident set size in bytes.
    pub resident_bytes: u64,
    /// Virtual memory size in bytes.
    pub virtual_bytes: u64,
    /// CPU time spent in user mode, in clock ticks.
    pub user_ticks: u64,
    /// CPU time spent in kernel mode, in clock ticks.
    pub system_ticks: u64,
    /// Clock ticks per second.
    pub ticks_per_second: u64,
}

#[cfg(target_os = "linux")]
fn read_process_usage() -> Option<ProcessUsage> {
    use procfs::process::Process;

    let stat = Process::myself()
        .and_then(|process| process.stat())
        .map_err(|e| tracing::debug!(error = %e, "failed to read process stat"))
        .ok()?;

    Some(ProcessUsage {
        resident_bytes: stat.rss * procfs::page_size(),
        virtual_bytes: stat.vsize,
        user_ticks: stat.utime,
        system_ticks: stat.stime,
        ticks_per_second: procfs::ticks_per_second(),
    })
}

#[cfg(not(target_os = "linux"))]
fn read_process_usage() -> Option<ProcessUsage> {
    None
}

/// Collector named `base`.
#[derive(Debug)]
pub struct BaseCollector {
    running_time: Arc<Descriptor>,
    process_memory: Arc<Descriptor>,
    process_cpu_time: Arc<Descriptor>,
    process_cpu_percent: Arc<Descriptor>,
    info: Arc<Descriptor>,
    os: Arc<Descriptor>,

    info_samples: Vec<Sample>,
    cpu_ticks: Mutex<RateTracker<()>>,

    host: Arc<dyn Host>,
}

pub(crate) fn build(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
    Ok(Box::new(BaseCollector::new(ctx.namespace, ctx.host.clone())?))
}

fn os_labels() -> Vec<(Cow<'static, str>, Cow<'static, str>)> {
    vec![
        (
            Cow::Borrowed("platform"),
            Cow::Owned(sysinfo::System::distribution_id()),
        ),
        (Cow::Borrowed("family"), Cow::Borrowed(std::env::consts::OS)),
        (
            Cow::Borrowed("kernel_version"),
            Cow::Owned(sysinfo::System::kernel_version().unwrap_or_default()),
        ),
        (
            Cow::Borrowed("pid"),
            Cow::Owned(std::process::id().to_string()),
        ),
    ]
}

impl BaseCollector {
    /// Creates the collector, computing the static info samples once.
    pub fn new(namespace: &str, host: Arc<dyn Host>) -> Result<Self> {
        let info = descriptor_with_const_labels(
            namespace,
            SUBSYSTEM,
            "info",
            "Engine address and version",
            &[],
            vec![
                (Cow::Borrowed("ip"), Cow::Owned(host.local_ip().to_owned())),
                (
                    Cow::Borrowed("version"),
                    Cow::Owned(host.version().to_owned()),
                ),
            ],
        )?;
        let os = descriptor_with_const_labels(
            namespace,
            SUBSYSTEM,
            "os",
            "Operating system the engine runs on",
            &[],
            os_labels(),
        )?;

        let version = version_to_float(host.version());
        let info_samples = vec![Sample::gauge(&info, version, &[])?, Sample::gauge(&os, version, &[])?];

        Ok(Self {
            running_time: descriptor(
                namespace,
                SUBSYSTEM,
                "running_time",
                "Seconds since the engine started",
                &["start_time"],
            )?,
            process_memory: descriptor(
                namespace,
                SUBSYSTEM,
                "process_memory",
                "Memory used by the process in MiB",
                &["memory_type"],
            )?,
            process_cpu_time: descriptor(
                namespace,
                SUBSYSTEM,
                "process_cpu_time",
                "CPU time used by the process in seconds",
                &["time_type"],
            )?,
            process_cpu_percent: descriptor(
                namespace,
                SUBSYSTEM,
                "process_cpu_percent",
                "CPU used by the process since the previous scrape, in percent of one core",
                &[],
            )?,
            info,
            os,
            info_samples,
            cpu_ticks: Mutex::new(RateTracker::default()),
            host,
        })
    }

    /// Turns one reading of the process' usage taken at `now` into samples.
    pub fn observe(&self, usage: &ProcessUsage, now: Instant) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(4);

        push(
            &mut samples,
            Sample::gauge(
                &self.process_memory,
                (usage.resident_bytes / MIB) as f64,
                &["physical"],
            ),
        );
        push(
            &mut samples,
            Sample::gauge(
                &self.process_memory,
                (usage.virtual_bytes / MIB) as f64,
                &["virtual"],
            ),
        );

        if usage.ticks_per_second == 0 {
            return samples;
        }
        let tps = usage.ticks_per_second as f64;

        push(
            &mut samples,
            Sample::gauge(&self.process_cpu_time, usage.user_ticks as f64 / tps, &["user"]),
        );

        let busy = usage.user_ticks.saturating_add(usage.system_ticks);
        if let Some(rate) = self.cpu_ticks.lock().observe((), busy, now) {
            push(
                &mut samples,
                Sample::gauge(&self.process_cpu_percent, rate / tps * 100.0, &[]),
            );
        }

        samples
    }

    fn running_time(&self) -> Result<Sample> {
        let start = self.host.start_time();
        let uptime = SystemTime::now()
            .duration_since(start)
            .unwrap_or_default()
            .as_secs_f64();
        let formatted = chrono::DateTime::<chrono::Local>::from(start)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Sample::counter(&self.running_time, uptime, &[formatted.as_str()])
    }
}

impl Collector for BaseCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.running_time.clone(),
            self.process_cpu_time.clone(),
            self.process_cpu_percent.clone(),
            self.process_memory.clone(),
            self.info.clone(),
            self.os.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let mut samples = self.info_samples.clone();
        push(&mut samples, self.running_time());
        if let Some(usage) = read_process_usage() {
            samples.extend(self.observe(&usage, Instant::now()));
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StandaloneHost;
    use std::time::Duration;

    fn collector() -> BaseCollector {
        BaseCollector::new("monibuca", Arc::new(StandaloneHost::new("10.0.0.7"))).unwrap()
    }

    fn find<'a>(samples: &'a [Sample], name: &str) -> Vec<&'a Sample> {
        samples
            .iter()
            .filter(|s| s.descriptor().name() == name)
            .collect()
    }

    #[test]
    fn version_components_are_weighted() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert_eq!(4.0, version_to_float("v4"));
        assert!(close(4.03, version_to_float("v4.3")));
        assert!(close(0.0312, version_to_float("0.3.12")));
        assert_eq!(0.0, version_to_float(""));
        assert_eq!(0.0, version_to_float("v4.3.12-rc1"));
    }

    #[test]
    fn info_and_os_carry_version() {
        let base = collector();
        let samples = base.collect();

        let info = find(&samples, "monibuca_base_info");
        assert_eq!(1, info.len());
        assert_eq!(version_to_float(env!("CARGO_PKG_VERSION")), info[0].value());
        assert!(info[0]
            .descriptor()
            .const_labels()
            .iter()
            .any(|(name, value)| name == "ip" && value == "10.0.0.7"));

        let os = find(&samples, "monibuca_base_os");
        assert_eq!(1, os.len());
        let pid = std::process::id().to_string();
        assert!(os[0]
            .descriptor()
            .const_labels()
            .iter()
            .any(|(name, value)| name == "pid" && *value == pid));
    }

    #[test]
    fn running_time_labels_start() {
        let base = collector();
        let samples = base.collect();

        let running = find(&samples, "monibuca_base_running_time");
        assert_eq!(1, running.len());
        assert!(running[0].value() >= 0.0);
        // e.g. 2024-05-01 13:37:00
        assert_eq!(19, running[0].label_values()[0].len());
    }

    #[test]
    fn process_usage_in_mib_and_seconds() {
        let base = collector();
        let usage = ProcessUsage {
            resident_bytes: 64 * MIB + 1,
            virtual_bytes: 512 * MIB,
            user_ticks: 250,
            system_ticks: 50,
            ticks_per_second: 100,
        };
        let samples = base.observe(&usage, Instant::now());

        let memory = find(&samples, "monibuca_base_process_memory");
        assert_eq!(64.0, memory[0].value());
        assert_eq!(["physical"], memory[0].label_values());
        assert_eq!(512.0, memory[1].value());

        let cpu_time = find(&samples, "monibuca_base_process_cpu_time");
        assert_eq!(2.5, cpu_time[0].value());
        assert!(find(&samples, "monibuca_base_process_cpu_percent").is_empty());
    }

    #[test]
    fn cpu_percent_between_scrapes() {
        let base = collector();
        let t0 = Instant::now();
        let mut usage = ProcessUsage {
            ticks_per_second: 100,
            ..Default::default()
        };

        base.observe(&usage, t0);
        usage.user_ticks = 30;
        usage.system_ticks = 20;
        let samples = base.observe(&usage, t0 + Duration::from_secs(2));

        let percent = find(&samples, "monibuca_base_process_cpu_percent");
        assert_eq!(25.0, percent[0].value());
    }
}
