//! Metric type implementations.

pub mod counter;
pub mod family;
pub mod sample;

/// Prometheus value kind of a [`sample::Sample`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricType {
    /// Monotonically increasing value, reset only on restart.
    Counter,
    /// Point-in-time value that may rise and fall.
    Gauge,
}

impl MetricType {
    /// Returns the given metric type's str representation.
    pub fn as_str(&self) -> &str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}
