use std::sync::Arc;
use std::time::SystemTime;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stream_exporter::collectors::media::MediaCollector;
use stream_exporter::encoding::text::encode;
use stream_exporter::host::{Host, StreamSummary};
use stream_exporter::registry::Registry;

#[derive(Debug)]
struct Engine(Vec<StreamSummary>);

impl Host for Engine {
    fn version(&self) -> &str {
        "v4.3.12"
    }

    fn local_ip(&self) -> &str {
        "127.0.0.1"
    }

    fn start_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn streams(&self) -> Vec<StreamSummary> {
        self.0.clone()
    }
}

pub fn text(c: &mut Criterion) {
    c.bench_function("gather and encode 1000 streams", |b| {
        let streams = (0..1000)
            .map(|i| StreamSummary {
                name: format!("live/camera{i}"),
                bps: 2_000_000 + i,
                subscribers: (i % 7) as usize,
            })
            .collect();
        let media = MediaCollector::new("monibuca", Arc::new(Engine(streams))).unwrap();

        let mut registry = Registry::default();
        registry
            .register_collector("media", Box::new(media))
            .unwrap();

        let mut buffer = String::new();

        b.iter(|| {
            encode(&mut buffer, &registry.gather()).unwrap();
            black_box(&mut buffer);
            buffer.clear();
        });
    });
}

criterion_group!(benches, text);
criterion_main!(benches);
