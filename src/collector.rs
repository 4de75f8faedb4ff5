//! Metric collector implementation.
//!
//! See [`Collector`] for details.

use std::any::Any;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::host::Host;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

/// The [`Collector`] abstraction lets a unit describe the metrics it can
/// produce, produce their current values on each scrape, and optionally fold
/// host lifecycle events into private cumulative state.
///
/// Collectors are shared between concurrent scrapes and the thread emitting
/// host events, hence every method takes `&self`. Mutable state lives behind
/// the collector's own lock or in atomics.
///
/// ```
/// # use std::sync::Arc;
/// # use stream_exporter::collector::Collector;
/// # use stream_exporter::metrics::sample::Sample;
/// # use stream_exporter::registry::Descriptor;
/// #
/// #[derive(Debug)]
/// struct Answer {
///     desc: Arc<Descriptor>,
/// }
///
/// impl Collector for Answer {
///     fn describe(&self) -> Vec<Arc<Descriptor>> {
///         vec![self.desc.clone()]
///     }
///
///     fn collect(&self) -> Vec<Sample> {
///         Sample::gauge(&self.desc, 42.0, &[]).into_iter().collect()
///     }
/// }
/// ```
pub trait Collector: std::fmt::Debug + Send + Sync + 'static {
    /// Every descriptor this collector may produce samples for. Called once
    /// at registration.
    fn describe(&self) -> Vec<Arc<Descriptor>>;

    /// Produces the current samples. Called on each scrape.
    ///
    /// Failures of the underlying stats provider result in missing samples,
    /// never in an error.
    fn collect(&self) -> Vec<Sample>;

    /// Folds a host lifecycle event into the collector's state.
    ///
    /// Runs on the event emitter's thread, so it must neither block nor do
    /// I/O. Collectors match the event shapes they know with
    /// [`Any::downcast_ref`] and ignore the rest.
    fn on_event(&self, _event: &dyn Any) {}
}

/// Everything a builder gets to construct its collector.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    /// Name the collector is built under.
    pub name: &'a str,
    /// The collector's `[collector.<name>]` table, if configured.
    pub config: Option<&'a toml::Table>,
    /// Metric namespace, the first component of every metric name.
    pub namespace: &'a str,
    /// The application the exporter is embedded in.
    pub host: Arc<dyn Host>,
}

impl BuildContext<'_> {
    /// Deserializes the collector's configuration table, falling back to
    /// `T::default()` when none is configured.
    pub fn config<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match self.config {
            Some(table) => toml::Value::Table(table.clone())
                .try_into()
                .map_err(|source| Error::Config {
                    collector: self.name.to_owned(),
                    source,
                }),
            None => Ok(T::default()),
        }
    }
}

/// Constructs a collector from its build context.
pub type CollectorBuilder = fn(&BuildContext<'_>) -> Result<Box<dyn Collector>>;
