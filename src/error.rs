//! Error type shared by the builder registry, the aggregator and the
//! collectors.

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building collectors or assembling the exposition
/// surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No builder is registered under the requested name.
    #[error("collector {0:?} not found")]
    CollectorNotFound(String),

    /// A builder with the same name was registered before.
    #[error("collector {0:?} is already registered")]
    DuplicateCollector(String),

    /// Two collectors publish a descriptor with the same fully-qualified name.
    #[error("descriptor {name:?} of collector {collector:?} is already registered")]
    DuplicateDescriptor {
        /// Fully-qualified metric name.
        name: String,
        /// Collector that tried to register the name a second time.
        collector: String,
    },

    /// Metric or label name does not match the Prometheus naming rules.
    #[error("invalid metric or label name {0:?}")]
    InvalidName(String),

    /// Descriptor is malformed, e.g. a label name is used twice.
    #[error("invalid descriptor {name:?}: {reason}")]
    InvalidDescriptor {
        /// Fully-qualified metric name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Number of label values does not match the descriptor's label names.
    #[error("descriptor {name:?} expects {expected} label values, got {actual}")]
    LabelCardinality {
        /// Fully-qualified metric name.
        name: String,
        /// Number of variable labels of the descriptor.
        expected: usize,
        /// Number of values handed in.
        actual: usize,
    },

    /// Sub-configuration of a collector could not be deserialized.
    #[error("invalid configuration for collector {collector:?}: {source}")]
    Config {
        /// Collector the configuration belongs to.
        collector: String,
        /// Underlying deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// `[collector.<name>]` entry is present but not a table.
    #[error("configuration for collector {collector:?} is not a table")]
    ConfigNotTable {
        /// Collector the entry belongs to.
        collector: String,
    },

    /// Interface filter expression does not compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending expression.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Exporter configuration document could not be parsed.
    #[error("invalid exporter configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
