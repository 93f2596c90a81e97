//! # Vehicle Map Service Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Availability | Dependency resolution over many offerings |
//! | Routing | Packet fan-out to subscribers |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::sync::Arc;

use vms_broker::domain::LayerAvailabilityResolver;
use vms_broker::{NoOpStatsService, RecordingCallback, VmsBrokerApi, VmsBrokerService};
use vms_types::{AssociatedLayer, ClientToken, Layer, LayerDependency, Offering, ProcessId, ProviderInfo};

// ============================================================================
// Availability
// ============================================================================

/// Offerings where each layer depends on up to three lower-numbered layers.
fn layered_offerings(providers: u32, layers: i32) -> Vec<Offering> {
    let mut rng = rand::thread_rng();
    (1..=providers)
        .map(|provider_id| {
            let mut dependencies = Vec::new();
            for layer_type in 0..layers {
                let mut requires = Vec::new();
                if layer_type > 0 {
                    for _ in 0..rng.gen_range(0..=3) {
                        requires.push(Layer::new(rng.gen_range(0..layer_type), 0, 0));
                    }
                }
                dependencies.push(LayerDependency::with_dependencies(
                    Layer::new(layer_type, 0, 0),
                    requires,
                ));
            }
            Offering::new(provider_id, dependencies)
        })
        .collect()
}

fn bench_availability_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("availability");

    for size in [10, 50, 200] {
        let offerings = layered_offerings(8, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("resolve", size), &offerings, |b, offerings| {
            b.iter(|| black_box(LayerAvailabilityResolver::resolve(offerings.iter())))
        });
    }

    group.finish();
}

// ============================================================================
// Routing
// ============================================================================

fn bench_packet_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    let layer = Layer::new(1, 0, 0);
    let payload = vec![0u8; 256];

    for subscribers in [1, 10, 100] {
        let broker =
            VmsBrokerService::new(Arc::new(NoOpStatsService), Arc::new(|| -> ProcessId { 1 }));
        let publisher = ClientToken::new();
        broker
            .register_client(publisher, Arc::new(RecordingCallback::new()), false)
            .unwrap();
        let provider_id = broker
            .register_provider(publisher, ProviderInfo::new(b"bench".to_vec()))
            .unwrap();
        broker
            .set_provider_offerings(publisher, provider_id, vec![LayerDependency::new(layer)])
            .unwrap();

        let mut callbacks = Vec::new();
        for _ in 0..subscribers {
            let token = ClientToken::new();
            let callback = Arc::new(RecordingCallback::new());
            broker
                .register_client(token, callback.clone(), false)
                .unwrap();
            broker
                .set_subscriptions(token, vec![AssociatedLayer::layer_only(layer)])
                .unwrap();
            callbacks.push(callback);
        }

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_function(BenchmarkId::new("publish_packet", subscribers), |b| {
            b.iter(|| {
                broker
                    .publish_packet(publisher, provider_id, layer, black_box(&payload))
                    .unwrap();
                for callback in &callbacks {
                    callback.clear();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_availability_resolution, bench_packet_routing);
criterion_main!(benches);
