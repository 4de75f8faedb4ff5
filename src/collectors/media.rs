//! Streams and clients of the host engine.
//!
//! Online counts come from the host on each scrape. Historic totals cannot be
//! recovered from a snapshot and are accumulated from lifecycle events.

use std::any::Any;
use std::sync::Arc;

use super::{descriptor, push};
use crate::collector::{BuildContext, Collector};
use crate::error::Result;
use crate::host::Host;
use crate::metrics::counter::Counter;
use crate::metrics::sample::Sample;
use crate::registry::Descriptor;

const SUBSYSTEM: &str = "media";

/// Lifecycle event: a stream started publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPublished {
    /// Stream path.
    pub stream: String,
}

/// Lifecycle event: a client subscribed to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberAdded {
    /// Stream path the client subscribed to.
    pub stream: String,
}

/// Collector named `media`.
#[derive(Debug)]
pub struct MediaCollector {
    online_streams: Arc<Descriptor>,
    online_clients: Arc<Descriptor>,
    total_streams: Arc<Descriptor>,
    total_clients: Arc<Descriptor>,
    stream_bps: Arc<Descriptor>,
    stream_clients: Arc<Descriptor>,

    streams_published: Counter,
    clients_subscribed: Counter,

    host: Arc<dyn Host>,
}

pub(crate) fn build(ctx: &BuildContext<'_>) -> Result<Box<dyn Collector>> {
    Ok(Box::new(MediaCollector::new(ctx.namespace, ctx.host.clone())?))
}

impl MediaCollector {
    /// Creates the collector reading live streams from `host`.
    pub fn new(namespace: &str, host: Arc<dyn Host>) -> Result<Self> {
        Ok(Self {
            online_streams: descriptor(
                namespace,
                SUBSYSTEM,
                "online_stream_count",
                "Number of streams currently online",
                &[],
            )?,
            online_clients: descriptor(
                namespace,
                SUBSYSTEM,
                "online_client_count",
                "Number of clients currently online",
                &[],
            )?,
            total_clients: descriptor(
                namespace,
                SUBSYSTEM,
                "total_client_sum",
                "Number of clients ever subscribed",
                &[],
            )?,
            total_streams: descriptor(
                namespace,
                SUBSYSTEM,
                "total_stream_sum",
                "Number of streams ever published",
                &[],
            )?,
            stream_bps: descriptor(
                namespace,
                SUBSYSTEM,
                "stream_bps",
                "Stream bitrate in bits per second",
                &["name"],
            )?,
            stream_clients: descriptor(
                namespace,
                SUBSYSTEM,
                "stream_client_count",
                "Number of clients currently subscribed to the stream",
                &["name"],
            )?,
            streams_published: Counter::default(),
            clients_subscribed: Counter::default(),
            host,
        })
    }

    /// Streams published since startup.
    pub fn streams_published(&self) -> u64 {
        self.streams_published.get()
    }

    /// Subscriptions since startup.
    pub fn clients_subscribed(&self) -> u64 {
        self.clients_subscribed.get()
    }
}

impl Collector for MediaCollector {
    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.online_clients.clone(),
            self.online_streams.clone(),
            self.total_clients.clone(),
            self.total_streams.clone(),
            self.stream_bps.clone(),
            self.stream_clients.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let streams = self.host.streams();
        let mut samples = Vec::with_capacity(streams.len() * 2 + 4);

        let mut online_clients = 0;
        for stream in &streams {
            push(
                &mut samples,
                Sample::gauge(&self.stream_bps, stream.bps as f64, &[stream.name.as_str()]),
            );
            push(
                &mut samples,
                Sample::gauge(
                    &self.stream_clients,
                    stream.subscribers as f64,
                    &[stream.name.as_str()],
                ),
            );
            online_clients += stream.subscribers;
        }

        push(
            &mut samples,
            Sample::counter(&self.total_streams, self.streams_published.get() as f64, &[]),
        );
        push(
            &mut samples,
            Sample::counter(&self.total_clients, self.clients_subscribed.get() as f64, &[]),
        );
        push(
            &mut samples,
            Sample::gauge(&self.online_streams, streams.len() as f64, &[]),
        );
        push(
            &mut samples,
            Sample::gauge(&self.online_clients, online_clients as f64, &[]),
        );

        samples
    }

    fn on_event(&self, event: &dyn Any) {
        if event.is::<StreamPublished>() {
            self.streams_published.inc();
        } else if event.is::<SubscriberAdded>() {
            self.clients_subscribed.inc();
        }
    }
}
