use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tillsync_core::{LocationId, TenantId, UserId};
use tillsync_reconciliation::{
    InMemoryPaymentRepository, InMemoryTransactionRepository, PaymentRecord, PaymentStatus,
    ReconciliationEngine, ReconciliationOptions, TransactionRecord, TransactionStatus,
};
use tillsync_storage::InMemoryKvStore;

fn bench_reconciliation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation_throughput");

    for record_count in [10usize, 100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(record_count as u64));
        group.bench_with_input(
            BenchmarkId::new("matched_pairs", record_count),
            &record_count,
            |b, &count| {
                let transactions = Arc::new(InMemoryTransactionRepository::new());
                let payments = Arc::new(InMemoryPaymentRepository::new());
                let tenant = TenantId::new();
                let location = LocationId::new();
                let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

                for i in 0..count {
                    let at = start + Duration::seconds(i as i64 % 86_400);
                    let total = 5.0 + (i % 200) as f64 * 0.25;
                    let method = if i % 3 == 0 { "cash" } else { "card" };
                    transactions.insert(TransactionRecord {
                        id: format!("txn-{i}"),
                        tenant_id: tenant,
                        location_id: location,
                        total,
                        payment_method: method.to_string(),
                        status: TransactionStatus::Completed,
                        occurred_at: at,
                    });
                    payments.insert(PaymentRecord {
                        id: format!("pay-{i}"),
                        tenant_id: tenant,
                        transaction_id: format!("txn-{i}"),
                        amount: total,
                        method: method.to_string(),
                        status: PaymentStatus::Captured,
                        occurred_at: at,
                    });
                }

                let engine = ReconciliationEngine::new(
                    Arc::new(InMemoryKvStore::new()),
                    transactions,
                    payments,
                );
                let end = start + Duration::days(1);
                let options = ReconciliationOptions::default();
                let user = UserId::new();

                b.iter(|| {
                    black_box(
                        engine
                            .perform_reconciliation(tenant, start, end, &options, user)
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_reconciliation_throughput);
criterion_main!(benches);
