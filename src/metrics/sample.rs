//! Module implementing a single measurement.
//!
//! See [`Sample`] for details.

use std::sync::Arc;
use std::time::SystemTime;

use super::MetricType;
use crate::error::{Error, Result};
use crate::registry::Descriptor;

/// One concrete value of a [`Descriptor`] with its label values bound.
///
/// ```
/// # use std::sync::Arc;
/// # use stream_exporter::metrics::sample::Sample;
/// # use stream_exporter::registry::Descriptor;
/// let desc = Arc::new(
///     Descriptor::new("monibuca_net_bytes_total", "Bytes", &["nic"], vec![]).unwrap(),
/// );
/// let sample = Sample::counter(&desc, 42.0, &["eth0"]).unwrap();
/// assert_eq!(sample.label_values(), ["eth0"]);
///
/// // The label tuple has to match the descriptor.
/// assert!(Sample::counter(&desc, 42.0, &[]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Sample {
    descriptor: Arc<Descriptor>,
    metric_type: MetricType,
    value: f64,
    label_values: Vec<String>,
    timestamp: Option<SystemTime>,
}

impl Sample {
    /// Creates a new [`Sample`], checking the label value count against the
    /// descriptor.
    pub fn new(
        descriptor: &Arc<Descriptor>,
        metric_type: MetricType,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self> {
        let expected = descriptor.variable_labels().len();
        if label_values.len() != expected {
            return Err(Error::LabelCardinality {
                name: descriptor.name().to_owned(),
                expected,
                actual: label_values.len(),
            });
        }

        Ok(Sample {
            descriptor: descriptor.clone(),
            metric_type,
            value,
            label_values: label_values.iter().map(|v| (*v).to_owned()).collect(),
            timestamp: None,
        })
    }

    /// Shorthand for a [`MetricType::Counter`] sample.
    pub fn counter(descriptor: &Arc<Descriptor>, value: f64, label_values: &[&str]) -> Result<Self> {
        Self::new(descriptor, MetricType::Counter, value, label_values)
    }

    /// Shorthand for a [`MetricType::Gauge`] sample.
    pub fn gauge(descriptor: &Arc<Descriptor>, value: f64, label_values: &[&str]) -> Result<Self> {
        Self::new(descriptor, MetricType::Gauge, value, label_values)
    }

    /// Attaches an explicit observation time, exposed in milliseconds since
    /// the unix epoch.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the descriptor this sample belongs to.
    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    /// Returns the value kind.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Returns the measured value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the label values, ordered like the descriptor's label names.
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Returns the observation time, if any.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }
}
