//! Exposition format implementations.
//!
//! Besides the [`text`] encoder this module holds the Prometheus naming rules
//! every [`Descriptor`](crate::registry::Descriptor) is checked against.

pub mod text;

/// Content type of the body produced by [`text::encode`].
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn is_valid_legacy_char(c: char, i: usize) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (c.is_ascii_digit() && i > 0)
}

/// Whether `name` is a valid metric name, i.e. matches
/// `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.chars()
        .enumerate()
        .all(|(i, c)| is_valid_legacy_char(c, i))
}

/// Whether `name` is a valid label name, i.e. matches
/// `[a-zA-Z_][a-zA-Z0-9_]*` and does not use the reserved `__` prefix.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with("__") {
        return false;
    }
    name.chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_alphabetic() || c == '_' || (c.is_ascii_digit() && i > 0))
}
