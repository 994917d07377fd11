use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use serde_json::json;
use tillsync_core::{LocationId, TenantId, UserId};
use tillsync_events::{OperationKind, RecordingBroadcaster};
use tillsync_offline::{OfflineConfig, OfflineQueueManager, OperationRequest};
use tillsync_storage::InMemoryKvStore;

fn manager() -> OfflineQueueManager<Arc<InMemoryKvStore>, RecordingBroadcaster> {
    OfflineQueueManager::new(
        Arc::new(InMemoryKvStore::new()),
        RecordingBroadcaster::new(),
        OfflineConfig::default(),
    )
}

fn request(tenant: TenantId, location: LocationId, n: usize) -> OperationRequest {
    OperationRequest {
        kind: OperationKind::Update,
        tenant_id: tenant,
        location_id: location,
        entity_type: "inventory".to_string(),
        entity_id: format!("sku-{n}"),
        data: json!({"on_hand": n}),
        user_id: UserId::new(),
        max_retries: None,
    }
}

fn bench_capture_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("offline_capture");

    // Enqueue into a queue already sitting at the cap, so every sample pays
    // the steady-state cost: decode, head insert, evict, re-encode.
    group.bench_function("queue_operation_at_cap", |b| {
        let manager = manager();
        let tenant = TenantId::new();
        let location = LocationId::new();
        let cap = manager.config().max_queue_len;
        for n in 0..cap {
            manager
                .queue_operation(request(tenant, location, n))
                .unwrap();
        }

        let mut n = cap;
        b.iter(|| {
            n += 1;
            manager
                .queue_operation(black_box(request(tenant, location, n)))
                .unwrap();
        });
    });

    group.finish();
}

fn bench_reconnect_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconnect_drain");

    for batch_size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("capture_then_drain", batch_size),
            &batch_size,
            |b, &size| {
                b.iter(|| {
                    let manager = manager();
                    let tenant = TenantId::new();
                    let location = LocationId::new();
                    for n in 0..size {
                        manager
                            .queue_operation(request(tenant, location, n))
                            .unwrap();
                    }
                    // Coming online drains the whole backlog.
                    manager.update_connectivity(tenant, location, true).unwrap();
                    black_box(manager.get_queue(tenant, location).unwrap().len())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_capture_latency, bench_reconnect_drain);
criterion_main!(benches);
