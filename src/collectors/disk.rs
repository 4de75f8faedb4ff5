//! Usage of the partition holding a path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sysinfo::Disks;

use super::{descriptor, push};
use crate::collector::{BuildContext, Collector};
use crate::error::Result;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

const SUBSYSTEM: &str = "disk";

const GIB: u64 = 1 << 30;

/// `[collector.disk]` configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskConfig {
    /// Path whose partition is reported.
    pub path: PathBuf,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/"),
        }
    }
}

/// Space on one mounted file system, in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountUsage {
    /// Where the file system is mounted.
    pub mount_point: PathBuf,
    /// File system size.
    pub total: u64,
    /// Space left.
    pub available: u64,
}

/// Picks the mount holding `path`: the one with the longest mount point
/// `path` lies under.
fn mount_of<'a>(mounts: &'a [MountUsage], path: &Path) -> Option<&'a MountUsage> {
    mounts
        .iter()
        .filter(|mount| path.starts_with(&mount.mount_point))
        .max_by_key(|mount| mount.mount_point.components().count())
}

/// Collector named `disk`.
#[derive(Debug)]
pub struct DiskCollector {
    total: Arc<Descriptor>,
    free: Arc<Descriptor>,
    used: Arc<Descriptor>,
    used_percent: Arc<Descriptor>,

    path: PathBuf,
    label: String,
}

pub(crate) fn build(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
    let config: DiskConfig = ctx.config()?;
    Ok(Box::new(DiskCollector::new(ctx.namespace, &config)?))
}

impl DiskCollector {
    /// Creates the collector.
    pub fn new(namespace: &str, config: &DiskConfig) -> Result<Self> {
        let gauge = |name: &str, help: &str| descriptor(namespace, SUBSYSTEM, name, help, &["path"]);

        Ok(Self {
            total: gauge("total", "Size of the partition in GiB")?,
            free: gauge("free", "Free space on the partition in GiB")?,
            used: gauge("used", "Used space on the partition in GiB")?,
            used_percent: gauge("used_percent", "Used space on the partition in percent")?,
            label: config.path.display().to_string(),
            path: config.path.clone(),
        })
    }

    /// Reports the mount holding the configured path, if any.
    pub fn observe(&self, mounts: &[MountUsage]) -> Vec<Sample> {
        let Some(mount) = mount_of(mounts, &self.path) else {
            tracing::debug!(path = %self.label, "no mount holds the path");
            return Vec::new();
        };

        let used = mount.total.saturating_sub(mount.available);
        let labels = [self.label.as_str()];
        let mut samples = Vec::with_capacity(4);

        push(
            &mut samples,
            Sample::gauge(&self.free, (mount.available / GIB) as f64, &labels),
        );
        push(
            &mut samples,
            Sample::gauge(&self.used, (used / GIB) as f64, &labels),
        );
        push(
            &mut samples,
            Sample::gauge(&self.total, (mount.total / GIB) as f64, &labels),
        );
        if mount.total > 0 {
            push(
                &mut samples,
                Sample::gauge(
                    &self.used_percent,
                    used as f64 / mount.total as f64 * 100.0,
                    &labels,
                ),
            );
        }

        samples
    }
}

impl Collector for DiskCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.free.clone(),
            self.total.clone(),
            self.used.clone(),
            self.used_percent.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let mounts: Vec<_> = Disks::new_with_refreshed_list()
            .iter()
            .map(|disk| MountUsage {
                mount_point: disk.mount_point().to_path_buf(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect();
        self.observe(&mounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount(point: &str, total_gib: u64, available_gib: u64) -> MountUsage {
        MountUsage {
            mount_point: PathBuf::from(point),
            total: total_gib * GIB,
            available: available_gib * GIB,
        }
    }

    #[test]
    fn longest_mount_point_wins() {
        let mounts = [mount("/", 100, 50), mount("/data", 400, 100), mount("/dat", 1, 1)];

        let found = mount_of(&mounts, Path::new("/data/records")).unwrap();
        assert_eq!(Path::new("/data"), found.mount_point);

        let found = mount_of(&mounts, Path::new("/database")).unwrap();
        assert_eq!(Path::new("/"), found.mount_point);
    }

    #[test]
    fn values_in_gib() {
        let disk = DiskCollector::new(
            "monibuca",
            &DiskConfig {
                path: PathBuf::from("/data"),
            },
        )
        .unwrap();
        let samples = disk.observe(&[mount("/", 100, 50), mount("/data", 400, 100)]);

        let value = |name: &str| {
            samples
                .iter()
                .find(|s| s.descriptor().name() == name)
                .map(Sample::value)
        };
        assert_eq!(Some(400.0), value("monibuca_disk_total"));
        assert_eq!(Some(100.0), value("monibuca_disk_free"));
        assert_eq!(Some(300.0), value("monibuca_disk_used"));
        assert_eq!(Some(75.0), value("monibuca_disk_used_percent"));
        assert!(samples.iter().all(|s| s.label_values() == ["/data"]));
    }

    #[test]
    fn missing_mount_yields_nothing() {
        let disk = DiskCollector::new(
            "monibuca",
            &DiskConfig {
                path: PathBuf::from("relative/path"),
            },
        )
        .unwrap();
        assert!(disk.observe(&[mount("/", 100, 50)]).is_empty());
    }
}
