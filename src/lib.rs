#![deny(dead_code)]
#![deny(missing_docs)]
#![deny(unused)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

//! Pluggable Prometheus collectors for a media streaming server.
//!
//! Collectors register a builder under a unique name, the operator picks the
//! enabled ones in the configuration, and the [`exporter::Exporter`] builds
//! them once at startup. On every scrape each collector reports the current
//! value of the metrics it described; in between, host lifecycle events
//! (stream published, client subscribed) are folded into the collectors'
//! cumulative counters.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use stream_exporter::collectors::media::{StreamPublished, SubscriberAdded};
//! use stream_exporter::config::ExporterConfig;
//! use stream_exporter::exporter::Exporter;
//! use stream_exporter::host::StandaloneHost;
//!
//! // Enable the collectors named in the configuration. Unset fields take
//! // their defaults, `[defaults]` expands to all built-in collectors.
//! let config = ExporterConfig::from_toml_str(
//!     r#"
//!     node_addr = "zh_cn"
//!     enabled = "media"
//!     process_metrics = false
//!     "#,
//! )
//! .unwrap();
//!
//! // The host application is the source of stream information.
//! let exporter = Exporter::new(&config, Arc::new(StandaloneHost::default())).unwrap();
//!
//! // Somewhere in the engine a stream starts and a client subscribes.
//! exporter.on_event(&StreamPublished { stream: "live/cam1".to_owned() });
//! exporter.on_event(&SubscriberAdded { stream: "live/cam1".to_owned() });
//!
//! // When Prometheus scrapes the node, render every metric in the text
//! // format.
//! let body = exporter.render().unwrap();
//! assert!(body.contains("# TYPE monibuca_media_total_stream_sum counter\n"));
//! ```
//! See `demos/axum.rs` for serving the metrics over HTTP.

pub mod builder;
pub mod collector;
pub mod collectors;
pub mod config;
pub mod encoding;
pub mod error;
pub mod exporter;
pub mod host;
pub mod metrics;
pub mod rate;
pub mod registry;

pub use error::{Error, Result};
