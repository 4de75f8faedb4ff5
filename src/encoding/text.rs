//! Prometheus text exposition format, version 0.0.4.
//!
//! ```
//! # use std::sync::Arc;
//! # use stream_exporter::collector::Collector;
//! # use stream_exporter::encoding::text::encode;
//! # use stream_exporter::metrics::sample::Sample;
//! # use stream_exporter::registry::{Descriptor, Registry};
//! #[derive(Debug)]
//! struct Online(Arc<Descriptor>);
//!
//! impl Collector for Online {
//!     fn describe(&self) -> Vec<Arc<Descriptor>> {
//!         vec![self.0.clone()]
//!     }
//!
//!     fn collect(&self) -> Vec<Sample> {
//!         Sample::gauge(&self.0, 3.0, &[]).into_iter().collect()
//!     }
//! }
//!
//! let desc = Descriptor::new("online_stream_count", "Streams online", &[], vec![]).unwrap();
//! let mut registry = Registry::default();
//! registry
//!     .register_collector("media", Box::new(Online(Arc::new(desc))))
//!     .unwrap();
//!
//! let mut buffer = String::new();
//! encode(&mut buffer, &registry.gather()).unwrap();
//!
//! let expected = "# HELP online_stream_count Streams online\n".to_owned()
//!     + "# TYPE online_stream_count gauge\n"
//!     + "online_stream_count 3\n";
//! assert_eq!(expected, buffer);
//! ```

use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::metrics::family::MetricFamily;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

/// Integral values below this magnitude are printed without a fraction.
const EXACT_INTEGER_LIMIT: f64 = 1e15;

/// Encode the given families into the provided buffer in the text format.
pub fn encode<W>(writer: &mut W, families: &[MetricFamily]) -> Result<(), std::fmt::Error>
where
    W: Write,
{
    for family in families {
        encode_family(writer, family)?;
    }
    Ok(())
}

fn encode_family<W: Write>(writer: &mut W, family: &MetricFamily) -> Result<(), std::fmt::Error> {
    let descriptor = family.descriptor();

    writer.write_str("# HELP ")?;
    writer.write_str(descriptor.name())?;
    writer.write_str(" ")?;
    write_escaped(writer, descriptor.help(), false)?;
    writer.write_str("\n")?;

    writer.write_str("# TYPE ")?;
    writer.write_str(descriptor.name())?;
    writer.write_str(" ")?;
    writer.write_str(family.metric_type().as_str())?;
    writer.write_str("\n")?;

    for sample in family.samples() {
        encode_sample(writer, descriptor, sample)?;
    }

    Ok(())
}

fn encode_sample<W: Write>(
    writer: &mut W,
    descriptor: &Descriptor,
    sample: &Sample,
) -> Result<(), std::fmt::Error> {
    writer.write_str(descriptor.name())?;

    let const_labels = descriptor
        .const_labels()
        .iter()
        .map(|(name, value)| (&**name, &**value));
    let variable_labels = descriptor
        .variable_labels()
        .iter()
        .map(|name| &**name)
        .zip(sample.label_values().iter().map(String::as_str));
    let mut labels = const_labels.chain(variable_labels).peekable();

    if labels.peek().is_some() {
        writer.write_char('{')?;
        let mut first = true;
        for (name, value) in labels {
            if !first {
                writer.write_char(',')?;
            }
            first = false;

            writer.write_str(name)?;
            writer.write_str("=\"")?;
            write_escaped(writer, value, true)?;
            writer.write_char('"')?;
        }
        writer.write_char('}')?;
    }

    writer.write_char(' ')?;
    encode_value(writer, sample.value())?;

    if let Some(timestamp) = sample.timestamp() {
        writer.write_char(' ')?;
        encode_timestamp(writer, timestamp)?;
    }

    writer.write_char('\n')
}

fn encode_value<W: Write>(writer: &mut W, v: f64) -> Result<(), std::fmt::Error> {
    if v.is_nan() {
        return writer.write_str("NaN");
    }
    if v.is_infinite() {
        return writer.write_str(if v > 0.0 { "+Inf" } else { "-Inf" });
    }
    if v.fract() == 0.0 && v.abs() < EXACT_INTEGER_LIMIT {
        return writer.write_str(itoa::Buffer::new().format(v as i64));
    }
    writer.write_str(dtoa::Buffer::new().format(v))
}

fn encode_timestamp<W: Write>(writer: &mut W, timestamp: SystemTime) -> Result<(), std::fmt::Error> {
    let millis = match timestamp.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_millis() as i64,
        Err(before) => -(before.duration().as_millis() as i64),
    };
    writer.write_str(itoa::Buffer::new().format(millis))
}

/// Escapes backslashes and newlines, and double quotes in label values.
fn write_escaped<W: Write>(writer: &mut W, s: &str, quote: bool) -> Result<(), std::fmt::Error> {
    for c in s.chars() {
        match c {
            '\\' => writer.write_str("\\\\")?,
            '\n' => writer.write_str("\\n")?,
            '"' if quote => writer.write_str("\\\"")?,
            c => writer.write_char(c)?,
        }
    }
    Ok(())
}
