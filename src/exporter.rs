//! The exporter facade the host application talks to.
//!
//! See [`Exporter`] for details.

use std::any::Any;
use std::sync::Arc;

use crate::builder::Builders;
use crate::collector::BuildContext;
use crate::config::ExporterConfig;
use crate::encoding::text;
use crate::error::Result;
use crate::host::{GlobalLabels, Host};
use crate::metrics::family::MetricFamily;
use crate::registry::Registry;

/// Owns the active collectors for the lifetime of the host.
///
/// Built once at startup from an [`ExporterConfig`]. Collectors that cannot
/// be built or registered are logged and skipped, the exporter itself only
/// fails on an unusable namespace.
///
/// ```
/// # use std::sync::Arc;
/// # use stream_exporter::config::ExporterConfig;
/// # use stream_exporter::exporter::Exporter;
/// # use stream_exporter::host::StandaloneHost;
/// let config = ExporterConfig {
///     enabled: "memory,media".to_owned(),
///     process_metrics: false,
///     ..Default::default()
/// };
/// let exporter = Exporter::new(&config, Arc::new(StandaloneHost::default())).unwrap();
///
/// assert_eq!(vec!["memory", "media"], exporter.collector_names());
/// assert!(exporter.render().unwrap().contains("monibuca_memory_total"));
/// ```
#[derive(Debug)]
pub struct Exporter {
    registry: Registry,
}

impl Exporter {
    /// Builds the enabled built-in collectors, labelling every metric with
    /// the configured node address and this machine's hostname.
    pub fn new(config: &ExporterConfig, host: Arc<dyn Host>) -> Result<Self> {
        Self::with_builders(
            config,
            host,
            Builders::global(),
            GlobalLabels::detect(config.node_addr.as_str()),
        )
    }

    /// Like [`Exporter::new`] with an explicit builder registry and global
    /// labels.
    pub fn with_builders(
        config: &ExporterConfig,
        host: Arc<dyn Host>,
        builders: &Builders,
        labels: GlobalLabels,
    ) -> Result<Self> {
        if config.print_collectors {
            tracing::info!(collectors = ?builders.available(), "available collectors");
        }

        let mut registry = Registry::with_labels(labels.to_labels().into_iter())
            .with_collector_duration(&config.namespace)?
            .with_slow_threshold(config.slow_threshold());

        for name in config.enabled_collectors() {
            let sub_config = match config.collector_config(&name) {
                Ok(sub_config) => sub_config,
                Err(e) => {
                    tracing::warn!(collector = %name, error = %e, "skipping collector");
                    continue;
                }
            };

            let ctx = BuildContext {
                name: &name,
                config: sub_config,
                namespace: &config.namespace,
                host: host.clone(),
            };

            let collector = match builders.build(&ctx) {
                Ok(collector) => collector,
                Err(e) => {
                    tracing::warn!(collector = %name, error = %e, "skipping collector");
                    continue;
                }
            };

            if let Err(e) = registry.register_collector(name.as_str(), collector) {
                tracing::error!(collector = %name, error = %e, "failed to register collector");
            }
        }

        if config.process_metrics {
            register_process_collector(&mut registry);
        }

        let enabled: Vec<_> = registry.collector_names().collect();
        tracing::info!(collectors = ?enabled, "enabled collectors");

        Ok(Self { registry })
    }

    /// Hands a host lifecycle event to every active collector.
    pub fn on_event(&self, event: &dyn Any) {
        self.registry.fold_event(event);
    }

    /// Current samples of every active collector.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Current samples in the text exposition format, see
    /// [`CONTENT_TYPE`](crate::encoding::CONTENT_TYPE).
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        text::encode(&mut buffer, &self.gather())?;
        Ok(buffer)
    }

    /// Names of the active collectors, in construction order.
    pub fn collector_names(&self) -> Vec<&str> {
        self.registry.collector_names().collect()
    }
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &mut Registry) {
    use crate::collectors::process::{ProcessCollector, NAME};

    let registered = ProcessCollector::new()
        .and_then(|collector| registry.register_collector(NAME, Box::new(collector)));
    if let Err(e) = registered {
        tracing::error!(collector = NAME, error = %e, "failed to register collector");
    }
}

#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &mut Registry) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::collectors::media::StreamPublished;
    use crate::host::StandaloneHost;
    use crate::metrics::sample::Sample;
    use crate::registry::Descriptor;

    #[derive(Debug)]
    struct Clash(Arc<Descriptor>);

    impl Collector for Clash {
        fn describe(&self) -> Vec<Arc<Descriptor>> {
            vec![self.0.clone()]
        }

        fn collect(&self) -> Vec<Sample> {
            vec![]
        }
    }

    fn clash(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
        let name = format!("{}_media_total_stream_sum", ctx.namespace);
        let desc = Descriptor::new(name, "clashes with media", &[], vec![])?;
        Ok(Box::new(Clash(Arc::new(desc))))
    }

    fn config(enabled: &str) -> ExporterConfig {
        ExporterConfig {
            enabled: enabled.to_owned(),
            print_collectors: false,
            process_metrics: false,
            ..Default::default()
        }
    }

    fn exporter(config: &ExporterConfig, builders: &Builders) -> Exporter {
        Exporter::with_builders(
            config,
            Arc::new(StandaloneHost::default()),
            builders,
            GlobalLabels::new(config.node_addr.as_str(), "test-host"),
        )
        .unwrap()
    }

    #[test]
    fn unknown_collectors_are_skipped() {
        let exporter = exporter(&config("gpu,media,memory"), &Builders::with_builtins());
        assert_eq!(vec!["media", "memory"], exporter.collector_names());
    }

    #[test]
    fn malformed_collector_config_is_skipped() {
        let mut config = config("media,net");
        config.collector = toml::from_str("[net]\nnic_whitelist = \"(\"").unwrap();

        let exporter = exporter(&config, &Builders::with_builtins());
        assert_eq!(vec!["media"], exporter.collector_names());
    }

    #[test]
    fn non_table_collector_config_is_skipped() {
        let mut config = config("net,media");
        config.collector = toml::from_str("net = \"bogus\"").unwrap();

        let exporter = exporter(&config, &Builders::with_builtins());
        assert_eq!(vec!["media"], exporter.collector_names());
    }

    #[test]
    fn clashing_collector_is_rejected() {
        let mut builders = Builders::with_builtins();
        builders.register("clash", clash);

        let exporter = exporter(&config("media,clash"), &builders);
        assert_eq!(vec!["media"], exporter.collector_names());
    }

    #[test]
    fn events_are_folded() {
        let exporter = exporter(&config("media"), &Builders::with_builtins());
        for i in 0..3 {
            exporter.on_event(&StreamPublished {
                stream: format!("live/{i}"),
            });
        }

        let body = exporter.render().unwrap();
        assert!(body.contains(
            "monibuca_media_total_stream_sum{nodeaddr=\"zh_cn\",hostname=\"test-host\"} 3\n"
        ));
    }

    #[test]
    fn bad_namespace_fails() {
        let mut config = config("media");
        config.namespace = "1-bad".to_owned();
        assert!(Exporter::with_builders(
            &config,
            Arc::new(StandaloneHost::default()),
            &Builders::with_builtins(),
            GlobalLabels::new("zh_cn", "test-host"),
        )
        .is_err());
    }
}
