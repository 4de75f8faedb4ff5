use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use stream_exporter::collectors::media::{StreamPublished, SubscriberAdded};
use stream_exporter::config::ExporterConfig;
use stream_exporter::encoding;
use stream_exporter::exporter::Exporter;
use stream_exporter::host::StandaloneHost;
use tracing_subscriber::EnvFilter;

pub async fn metrics_handler(State(exporter): State<Arc<Exporter>>) -> impl IntoResponse {
    // Collect calls may block for the CPU sampling window.
    let rendered = tokio::task::spawn_blocking(move || exporter.render()).await;

    match rendered {
        Ok(Ok(body)) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, encoding::CONTENT_TYPE)
            .body(Body::from(body))
            .unwrap(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let document = std::fs::read_to_string(path).unwrap();
            ExporterConfig::from_toml_str(&document).unwrap()
        }
        None => ExporterConfig::default(),
    };

    let exporter = Arc::new(Exporter::new(&config, Arc::new(StandaloneHost::default())).unwrap());

    // Stand-in for the streaming engine's lifecycle events.
    let events = exporter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        for i in 0u64.. {
            interval.tick().await;
            let stream = format!("live/demo{}", i % 4);
            events.on_event(&StreamPublished {
                stream: stream.clone(),
            });
            events.on_event(&SubscriberAdded { stream });
        }
    });

    let router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(exporter);
    let port = 8080;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .unwrap();

    axum::serve(listener, router).await.unwrap();
}
