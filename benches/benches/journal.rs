use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use crosscall_types::{Address, U256};
use crosscall_vm::AccountStore;

fn addr(i: u8) -> Address {
    Address::from_bytes([i; 32])
}

fn bench_storage_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal_storage");
    let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..1000)
        .map(|i| (format!("k{i}").into_bytes(), format!("v{i}").into_bytes()))
        .collect();

    group.bench_function("write_1k_then_revert", |b| {
        b.iter_batched(
            AccountStore::new,
            |mut store| {
                let checkpoint = store.checkpoint();
                for (key, value) in &entries {
                    store.set_storage(&addr(1), key, value);
                }
                store.revert_to(checkpoint);
                black_box(store.pending_changes())
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("write_1k_then_commit", |b| {
        b.iter_batched(
            AccountStore::new,
            |mut store| {
                let checkpoint = store.checkpoint();
                for (key, value) in &entries {
                    store.set_storage(&addr(1), key, value);
                }
                store.commit_to(checkpoint);
                black_box(store.pending_changes())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_transfers(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal_transfers");

    group.bench_function("nested_checkpoints_100", |b| {
        b.iter_batched(
            || {
                let mut store = AccountStore::new();
                store.seed_balance(&addr(1), U256::from(1_000_000u64));
                store
            },
            |mut store| {
                let mut checkpoints = Vec::with_capacity(100);
                for i in 0..100u8 {
                    checkpoints.push(store.checkpoint());
                    let _ = store.transfer(&addr(1), &addr(2 + i % 4), U256::ONE, Default::default());
                }
                for checkpoint in checkpoints.into_iter().rev() {
                    store.revert_to(checkpoint);
                }
                black_box(store.balance(&addr(1)))
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_storage_writes, bench_transfers);
criterion_main!(benches);
