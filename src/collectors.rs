//! Built-in collectors.
//!
//! | name     | source                                   |
//! |----------|------------------------------------------|
//! | `base`   | host uptime, own process usage, versions |
//! | `cpu`    | CPU usage and times                      |
//! | `memory` | system memory                            |
//! | `disk`   | usage of the partition holding a path    |
//! | `net`    | per-interface traffic and rates          |
//! | `media`  | streams and clients of the host          |
//!
//! On Linux, `process::ProcessCollector` is not built by name; the exporter
//! registers it as an additional source.

pub mod base;
pub mod cpu;
pub mod disk;
pub mod media;
pub mod memory;
pub mod net;
#[cfg(target_os = "linux")]
pub mod process;

use std::sync::Arc;

use crate::builder::Builders;
use crate::error::Result;
use crate::metrics::sample::Sample;
use crate::registry::{build_fq_name, Descriptor, Label};

/// Collector names enabled by the `[defaults]` placeholder.
pub const DEFAULT_COLLECTORS: &str = "base,cpu,memory,disk,net,media";

pub(crate) fn register_builtins(builders: &mut Builders) {
    builders.register("base", base::build);
    builders.register("cpu", cpu::build);
    builders.register("memory", memory::build);
    builders.register("disk", disk::build);
    builders.register("net", net::build);
    builders.register("media", media::build);
}

pub(crate) fn descriptor(
    namespace: &str,
    subsystem: &str,
    name: &str,
    help: &str,
    labels: &[&'static str],
) -> Result<Arc<Descriptor>> {
    descriptor_with_const_labels(namespace, subsystem, name, help, labels, vec![])
}

pub(crate) fn descriptor_with_const_labels(
    namespace: &str,
    subsystem: &str,
    name: &str,
    help: &str,
    labels: &[&'static str],
    const_labels: Vec<Label>,
) -> Result<Arc<Descriptor>> {
    Descriptor::new(
        build_fq_name(namespace, subsystem, name),
        help,
        labels,
        const_labels,
    )
    .map(Arc::new)
}

/// Appends `sample`, logging and skipping it if it could not be built.
pub(crate) fn push(samples: &mut Vec<Sample>, sample: Result<Sample>) {
    match sample {
        Ok(sample) => samples.push(sample),
        Err(e) => tracing::debug!(error = %e, "dropping malformed sample"),
    }
}
