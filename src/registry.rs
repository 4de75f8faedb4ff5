//! Metric registry implementation.
//!
//! See [`Registry`] for details.

use std::any::Any;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::collector::Collector;
use crate::encoding::{is_valid_label_name, is_valid_metric_name};
use crate::error::{Error, Result};
use crate::metrics::family::MetricFamily;
use crate::metrics::sample::Sample;
use crate::metrics::MetricType;

/// A constant label, i.e. a name and value pair fixed for a descriptor.
pub type Label = (Cow<'static, str>, Cow<'static, str>);

/// Joins namespace, subsystem and name with `_`, skipping empty components.
///
/// Returns an empty string if `name` is empty.
///
/// ```
/// # use stream_exporter::registry::build_fq_name;
/// assert_eq!("monibuca_net_bytes_total", build_fq_name("monibuca", "net", "bytes_total"));
/// assert_eq!("monibuca_info", build_fq_name("monibuca", "", "info"));
/// assert_eq!("", build_fq_name("monibuca", "net", ""));
/// ```
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// A metric aggregator.
///
/// Constructed collectors are registered with the [`Registry`] once at
/// startup. On each scrape [`Registry::gather`] asks every collector for its
/// current samples and merges them into one list of [`MetricFamily`]s, each
/// descriptor enriched with the registry's global labels. Lifecycle events
/// are handed to every collector through [`Registry::fold_event`].
///
/// Registration is pedantic: a fully-qualified metric name may only be
/// claimed by one collector, a conflicting collector is rejected rather than
/// silently shadowed.
///
/// ```
/// # use std::borrow::Cow;
/// # use stream_exporter::registry::Registry;
/// let registry = Registry::with_labels(
///     [(Cow::Borrowed("nodeaddr"), Cow::Borrowed("zh_cn"))].into_iter(),
/// );
/// assert!(registry.gather().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    labels: Vec<Label>,
    collectors: Vec<Entry>,
    names: HashSet<String>,
    duration: Option<Arc<Descriptor>>,
    slow_threshold: Option<Duration>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    collector: Box<dyn Collector>,
    descriptors: HashMap<String, Arc<Descriptor>>,
}

impl Registry {
    /// Creates a new default [`Registry`] with the given global labels.
    pub fn with_labels(labels: impl Iterator<Item = Label>) -> Self {
        Self {
            labels: labels.collect(),
            ..Default::default()
        }
    }

    /// Exports the duration of every collector's last collect call as
    /// `<namespace>_exporter_collector_duration_seconds{collector}`.
    pub fn with_collector_duration(mut self, namespace: &str) -> Result<Self> {
        let descriptor = Descriptor::new(
            build_fq_name(namespace, "exporter", "collector_duration_seconds"),
            "Time the collector spent producing its samples",
            &["collector"],
            vec![],
        )?
        .with_const_labels(&self.labels)?;

        self.names.insert(descriptor.name().to_owned());
        self.duration = Some(Arc::new(descriptor));
        Ok(self)
    }

    /// Collect calls taking longer than `threshold` are logged as warnings.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// Returns the global labels applied to every descriptor.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Register a [`Collector`] under `name`.
    ///
    /// Fails without registering anything if the collector claims a
    /// fully-qualified name another collector already owns, describes the
    /// same name twice, or uses a constant label that clashes with a global
    /// label.
    pub fn register_collector(
        &mut self,
        name: impl Into<String>,
        collector: Box<dyn Collector>,
    ) -> Result<()> {
        let name = name.into();
        if self.collectors.iter().any(|entry| entry.name == name) {
            return Err(Error::DuplicateCollector(name));
        }

        let mut descriptors = HashMap::new();
        for descriptor in collector.describe() {
            let fq_name = descriptor.name().to_owned();
            if self.names.contains(&fq_name) || descriptors.contains_key(&fq_name) {
                return Err(Error::DuplicateDescriptor {
                    name: fq_name,
                    collector: name,
                });
            }

            let enriched = descriptor.with_const_labels(&self.labels)?;
            descriptors.insert(fq_name, Arc::new(enriched));
        }

        self.names.extend(descriptors.keys().cloned());
        self.collectors.push(Entry {
            name,
            collector,
            descriptors,
        });

        Ok(())
    }

    /// Names of the registered collectors, in registration order.
    pub fn collector_names(&self) -> impl Iterator<Item = &str> {
        self.collectors.iter().map(|entry| entry.name.as_str())
    }

    /// Hands `event` to every registered collector, in registration order.
    pub fn fold_event(&self, event: &dyn Any) {
        for entry in &self.collectors {
            entry.collector.on_event(event);
        }
    }

    /// Collects the current samples of every registered collector.
    ///
    /// Samples whose descriptor the collector never described, or whose
    /// value kind disagrees with earlier samples of the same name, are
    /// dropped with a warning. Families are sorted by name.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let mut families: Vec<MetricFamily> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut durations = Vec::with_capacity(self.collectors.len());

        for entry in &self.collectors {
            let start = Instant::now();
            let samples = entry.collector.collect();
            let elapsed = start.elapsed();

            if let Some(threshold) = self.slow_threshold {
                if elapsed > threshold {
                    tracing::warn!(
                        collector = %entry.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "collector is slow to produce samples"
                    );
                }
            }
            durations.push((entry.name.as_str(), elapsed));

            for sample in samples {
                let Some(descriptor) = entry.descriptors.get(sample.descriptor().name()) else {
                    tracing::warn!(
                        collector = %entry.name,
                        metric = %sample.descriptor().name(),
                        "dropping sample of undescribed metric"
                    );
                    continue;
                };

                let idx = *index.entry(descriptor.name().to_owned()).or_insert_with(|| {
                    families.push(MetricFamily::new(descriptor.clone(), sample.metric_type()));
                    families.len() - 1
                });

                let family = &mut families[idx];
                if family.metric_type() != sample.metric_type() {
                    tracing::warn!(
                        collector = %entry.name,
                        metric = %descriptor.name(),
                        "dropping sample with inconsistent metric type"
                    );
                    continue;
                }
                family.push(sample);
            }
        }

        if let Some(descriptor) = &self.duration {
            let mut family = MetricFamily::new(descriptor.clone(), MetricType::Gauge);
            for (name, elapsed) in durations {
                if let Ok(sample) = Sample::gauge(descriptor, elapsed.as_secs_f64(), &[name]) {
                    family.push(sample);
                }
            }
            families.push(family);
        }

        families.sort_by(|a, b| a.name().cmp(b.name()));
        families
    }
}

/// Prometheus metric descriptor.
///
/// Immutable identity of one metric: fully-qualified name, help text,
/// ordered variable label names and constant labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    name: String,
    help: String,
    variable_labels: Vec<Cow<'static, str>>,
    const_labels: Vec<Label>,
}

impl Descriptor {
    /// Create new [`Descriptor`].
    ///
    /// Fails if the metric name or any label name is invalid, or if a label
    /// name is used twice.
    pub fn new<N: Into<String>, H: Into<String>>(
        name: N,
        help: H,
        variable_labels: &[&'static str],
        const_labels: Vec<Label>,
    ) -> Result<Self> {
        let name = name.into();
        if !is_valid_metric_name(&name) {
            return Err(Error::InvalidName(name));
        }

        let descriptor = Descriptor {
            name,
            help: help.into(),
            variable_labels: variable_labels.iter().map(|l| Cow::Borrowed(*l)).collect(),
            const_labels,
        };
        descriptor.validate_labels()?;

        Ok(descriptor)
    }

    /// Returns a copy with `labels` appended to the constant labels.
    pub fn with_const_labels(&self, labels: &[Label]) -> Result<Self> {
        let mut descriptor = self.clone();
        descriptor.const_labels.extend_from_slice(labels);
        descriptor.validate_labels()?;
        Ok(descriptor)
    }

    fn validate_labels(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let names = self
            .const_labels
            .iter()
            .map(|(name, _)| name)
            .chain(self.variable_labels.iter());

        for label in names {
            if !is_valid_label_name(label) {
                return Err(Error::InvalidName(label.to_string()));
            }
            if !seen.insert(&**label) {
                return Err(Error::InvalidDescriptor {
                    name: self.name.clone(),
                    reason: format!("duplicate label name {label:?}"),
                });
            }
        }

        Ok(())
    }

    /// Returns the fully-qualified name of the [`Descriptor`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the help text of the [`Descriptor`].
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Returns the variable label names, in sample order.
    pub fn variable_labels(&self) -> &[Cow<'static, str>] {
        &self.variable_labels
    }

    /// Returns the constant labels of the [`Descriptor`].
    pub fn const_labels(&self) -> &[Label] {
        &self.const_labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct Fixed {
        desc: Arc<Descriptor>,
        value: f64,
    }

    impl Fixed {
        fn boxed(name: &str, value: f64) -> Box<dyn Collector> {
            let desc = Descriptor::new(name, "fixed value", &["kind"], vec![]).unwrap();
            Box::new(Fixed {
                desc: Arc::new(desc),
                value,
            })
        }
    }

    impl Collector for Fixed {
        fn describe(&self) -> Vec<Arc<Descriptor>> {
            vec![self.desc.clone()]
        }

        fn collect(&self) -> Vec<Sample> {
            vec![Sample::gauge(&self.desc, self.value, &["a"]).unwrap()]
        }
    }

    #[derive(Debug)]
    struct Undescribed;

    impl Collector for Undescribed {
        fn describe(&self) -> Vec<Arc<Descriptor>> {
            vec![]
        }

        fn collect(&self) -> Vec<Sample> {
            let desc = Arc::new(Descriptor::new("sneaky", "not described", &[], vec![]).unwrap());
            vec![Sample::gauge(&desc, 1.0, &[]).unwrap()]
        }
    }

    #[derive(Debug)]
    struct Recorder {
        id: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Collector for Recorder {
        fn describe(&self) -> Vec<Arc<Descriptor>> {
            vec![]
        }

        fn collect(&self) -> Vec<Sample> {
            vec![]
        }

        fn on_event(&self, event: &dyn Any) {
            if event.downcast_ref::<u32>().is_some() {
                self.seen.lock().push(self.id);
            }
        }
    }

    #[test]
    fn descriptor_rejects_invalid_names() {
        assert!(matches!(
            Descriptor::new("", "help", &[], vec![]),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            Descriptor::new("valid", "help", &["not valid"], vec![]),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            Descriptor::new(
                "valid",
                "help",
                &["nic"],
                vec![(Cow::Borrowed("nic"), Cow::Borrowed("eth0"))]
            ),
            Err(Error::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn duplicate_descriptor_fails_registration() {
        let mut registry = Registry::default();
        registry
            .register_collector("first", Fixed::boxed("shared_name", 1.0))
            .unwrap();

        let err = registry
            .register_collector("second", Fixed::boxed("shared_name", 2.0))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDescriptor { ref collector, .. } if collector == "second"));

        // The rejected collector contributes nothing.
        assert_eq!(vec!["first"], registry.collector_names().collect::<Vec<_>>());
        let families = registry.gather();
        assert_eq!(1, families.len());
        assert_eq!(1, families[0].samples().len());
        assert_eq!(1.0, families[0].samples()[0].value());
    }

    #[test]
    fn duplicate_collector_name_fails_registration() {
        let mut registry = Registry::default();
        registry
            .register_collector("net", Fixed::boxed("a", 1.0))
            .unwrap();
        assert!(matches!(
            registry.register_collector("net", Fixed::boxed("b", 1.0)),
            Err(Error::DuplicateCollector(_))
        ));
    }

    #[test]
    fn global_labels_are_applied() {
        let mut registry = Registry::with_labels(
            [(Cow::Borrowed("hostname"), Cow::Borrowed("box"))].into_iter(),
        );
        registry
            .register_collector("fixed", Fixed::boxed("value", 3.0))
            .unwrap();

        let families = registry.gather();
        assert_eq!(
            &[(Cow::Borrowed("hostname"), Cow::Borrowed("box"))],
            families[0].descriptor().const_labels()
        );
    }

    #[test]
    fn global_label_clash_fails_registration() {
        let mut registry = Registry::with_labels(
            [(Cow::Borrowed("kind"), Cow::Borrowed("x"))].into_iter(),
        );
        assert!(matches!(
            registry.register_collector("fixed", Fixed::boxed("value", 3.0)),
            Err(Error::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn undescribed_samples_are_dropped() {
        let mut registry = Registry::default();
        registry
            .register_collector("undescribed", Box::new(Undescribed))
            .unwrap();
        registry
            .register_collector("fixed", Fixed::boxed("value", 3.0))
            .unwrap();

        let families = registry.gather();
        assert_eq!(vec!["value"], families.iter().map(|f| f.name()).collect::<Vec<_>>());
    }

    #[test]
    fn families_are_sorted_and_durations_exported() {
        let mut registry = Registry::default().with_collector_duration("ns").unwrap();
        registry
            .register_collector("zeta", Fixed::boxed("zeta", 1.0))
            .unwrap();
        registry
            .register_collector("alpha", Fixed::boxed("alpha", 1.0))
            .unwrap();

        let families = registry.gather();
        let names: Vec<_> = families.iter().map(|f| f.name()).collect();
        assert_eq!(
            vec!["alpha", "ns_exporter_collector_duration_seconds", "zeta"],
            names
        );

        let durations = &families[1];
        assert_eq!(2, durations.samples().len());
        assert_eq!(["zeta"], durations.samples()[0].label_values());
    }

    #[test]
    fn duration_name_is_reserved() {
        let mut registry = Registry::default().with_collector_duration("ns").unwrap();
        assert!(registry
            .register_collector(
                "impostor",
                Fixed::boxed("ns_exporter_collector_duration_seconds", 1.0)
            )
            .is_err());
    }

    #[test]
    fn events_reach_collectors_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::default();
        for id in ["c", "a", "b"] {
            registry
                .register_collector(
                    id,
                    Box::new(Recorder {
                        id,
                        seen: seen.clone(),
                    }),
                )
                .unwrap();
        }

        registry.fold_event(&7u32);
        registry.fold_event(&"ignored");

        assert_eq!(vec!["c", "a", "b"], *seen.lock());
    }
}
