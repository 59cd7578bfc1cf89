use std::sync::Arc;

use common::{IdempotencyToken, OrderId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::{InMemoryStockStore, InventoryLedger};

fn seeded_ledger(rt: &tokio::runtime::Runtime) -> InventoryLedger<InMemoryStockStore> {
    let ledger = InventoryLedger::new(Arc::new(InMemoryStockStore::new()));
    rt.block_on(async {
        ledger
            .set_stock(&ProductId::new("p1"), 1_000_000)
            .await
            .unwrap();
    });
    ledger
}

fn bench_fresh_decrement(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = seeded_ledger(&rt);
    let product_id = ProductId::new("p1");

    c.bench_function("ledger/decrement_fresh_token", |b| {
        b.iter(|| {
            rt.block_on(async {
                let token = IdempotencyToken::for_stock_decrement(OrderId::new(), 0, &product_id);
                ledger.decrement(&product_id, 1, &token).await.unwrap();
            });
        });
    });
}

fn bench_duplicate_decrement(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = seeded_ledger(&rt);
    let product_id = ProductId::new("p1");
    let token = IdempotencyToken::for_stock_decrement(OrderId::new(), 0, &product_id);
    rt.block_on(async {
        ledger.decrement(&product_id, 1, &token).await.unwrap();
    });

    c.bench_function("ledger/decrement_duplicate_token", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.decrement(&product_id, 1, &token).await.unwrap();
            });
        });
    });
}

fn bench_concurrent_decrements(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = Arc::new(seeded_ledger(&rt));

    c.bench_function("ledger/decrement_100_concurrent", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order_id = OrderId::new();
                let mut handles = Vec::with_capacity(100);
                for line in 0..100 {
                    let ledger = ledger.clone();
                    handles.push(tokio::spawn(async move {
                        let product_id = ProductId::new("p1");
                        let token =
                            IdempotencyToken::for_stock_decrement(order_id, line, &product_id);
                        ledger.decrement(&product_id, 1, &token).await.unwrap();
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_fresh_decrement,
    bench_duplicate_decrement,
    bench_concurrent_decrements,
);
criterion_main!(benches);
