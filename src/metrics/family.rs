//! Module implementing a gathered metric family.
//!
//! See [`MetricFamily`] for details.

use std::sync::Arc;

use super::sample::Sample;
use super::MetricType;
use crate::registry::Descriptor;

/// All samples of one fully-qualified metric name produced by a single
/// gather, ready to be handed to an encoder.
///
/// The descriptor of a family already carries the registry's global labels.
#[derive(Debug, Clone)]
pub struct MetricFamily {
    descriptor: Arc<Descriptor>,
    metric_type: MetricType,
    samples: Vec<Sample>,
}

impl MetricFamily {
    pub(crate) fn new(descriptor: Arc<Descriptor>, metric_type: MetricType) -> Self {
        Self {
            descriptor,
            metric_type,
            samples: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Returns the fully-qualified metric name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the descriptor, including global labels.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Returns the value kind shared by all samples.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Returns the samples in the order the collector produced them.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}
