use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shmbus::{build, unlink, MwmrPublisher, Recv, Region, Subscriber, SwmrPublisher, TopicConfig};
use std::sync::Arc;

fn bench_path(tag: &str) -> String {
    format!("/shmbus-bench-{}-{}", tag, std::process::id())
}

fn benchmark_swmr_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("swmr_publish");

    for payload_size in [16usize, 64, 256, 1024].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(payload_size),
            payload_size,
            |b, &payload_size| {
                let path = bench_path("pub");
                let _ = unlink(&path);
                build(
                    &path,
                    16 * 1024 * 1024,
                    &[TopicConfig::swmr("bench", 4096, payload_size as u32)],
                )
                .unwrap();
                let region = Arc::new(Region::attach(&path).unwrap());
                let mut publisher = SwmrPublisher::new(Arc::clone(&region), "bench", 1).unwrap();
                let payload = vec![0xABu8; payload_size];

                b.iter(|| publisher.publish(&payload).unwrap());

                drop(publisher);
                drop(region);
                let _ = unlink(&path);
            },
        );
    }

    group.finish();
}

fn benchmark_publish_consume_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("roundtrip");
    group.throughput(Throughput::Elements(1));

    group.bench_function("publish_then_next_64b", |b| {
        let path = bench_path("rt");
        let _ = unlink(&path);
        build(
            &path,
            16 * 1024 * 1024,
            &[TopicConfig::swmr("bench", 4096, 64)],
        )
        .unwrap();
        let region = Arc::new(Region::attach(&path).unwrap());
        let mut publisher = SwmrPublisher::new(Arc::clone(&region), "bench", 1).unwrap();
        let mut subscriber = Subscriber::new(Arc::clone(&region), "bench").unwrap();
        let payload = [0x5Au8; 64];
        let mut buf = [0u8; 64];

        b.iter(|| {
            publisher.publish(&payload).unwrap();
            match subscriber.next(&mut buf) {
                Recv::Message { len, .. } => len,
                other => panic!("unexpected {:?}", other),
            }
        });

        drop(publisher);
        drop(subscriber);
        drop(region);
        let _ = unlink(&path);
    });

    group.finish();
}

fn benchmark_mwmr_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mwmr_publish");
    group.throughput(Throughput::Elements(1));

    group.bench_function("uncontended_64b", |b| {
        let path = bench_path("mw");
        let _ = unlink(&path);
        build(
            &path,
            16 * 1024 * 1024,
            &[TopicConfig::mwmr("bench", 4096, 64)],
        )
        .unwrap();
        let region = Arc::new(Region::attach(&path).unwrap());
        let mut publisher = MwmrPublisher::new(Arc::clone(&region), "bench", 1).unwrap();
        let payload = [0xC3u8; 64];

        b.iter(|| publisher.publish(&payload).unwrap());

        drop(publisher);
        drop(region);
        let _ = unlink(&path);
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_swmr_publish,
    benchmark_publish_consume_roundtrip,
    benchmark_mwmr_publish
);
criterion_main!(benches);
