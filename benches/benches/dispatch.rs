use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use crosscall_fixtures::{fixture, CHILD_SC, PARENT_SC, SECOND_SC, USER};
use crosscall_types::{Address, U256};
use crosscall_vm::call_data::encode_i64;
use crosscall_vm::{CallInput, VmHost};

fn host_with(installs: &[(Address, &str)]) -> VmHost {
    let mut host = VmHost::default();
    for (address, name) in installs {
        let contract = fixture(name).unwrap();
        host.install_contract(*address, contract.into_arc()).unwrap();
        host.set_balance(address, U256::from(1_000_000u64));
    }
    host
}

fn bench_recursive_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_recursive");
    let self_sc = Address::from_padded_name("selfSC").unwrap();

    for depth in [10i64, 100, 500] {
        group.bench_with_input(BenchmarkId::new("self_dest_ctx", depth), &depth, |b, &depth| {
            b.iter_batched(
                || host_with(&[(self_sc, "exec-dest-ctx-recursive-self")]),
                |mut host| {
                    let input = CallInput::new(USER, self_sc, "recursiveMethodCall", 10_000_000)
                        .with_argument(encode_i64(depth));
                    black_box(host.run_call(input).unwrap())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.bench_function("alternating_dest_ctx_20", |b| {
        b.iter_batched(
            || {
                host_with(&[
                    (PARENT_SC, "exec-dest-ctx-recursive-parent"),
                    (CHILD_SC, "exec-dest-ctx-recursive-child"),
                ])
            },
            |mut host| {
                let input = CallInput::new(USER, PARENT_SC, "parentCallsChild", 1_000_000)
                    .with_argument(encode_i64(20));
                black_box(host.run_call(input).unwrap())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_async_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_async");

    for (label, chosen) in [("succeed", 0i64), ("child_error", 1), ("callback_error", 3)] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || {
                    host_with(&[
                        (PARENT_SC, "async-call-parent"),
                        (CHILD_SC, "async-call-child"),
                    ])
                },
                |mut host| {
                    let input = CallInput::new(USER, PARENT_SC, "parentPerformAsyncCall", 200_000)
                        .with_argument(encode_i64(chosen));
                    black_box(host.run_call(input).unwrap())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_same_context_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_same_ctx");
    group.sample_size(20);

    group.bench_function("two_children_20k_chunks", |b| {
        b.iter_batched(
            || {
                host_with(&[
                    (PARENT_SC, "exec-same-ctx-simple-parent"),
                    (SECOND_SC, "exec-same-ctx-simple-child"),
                ])
            },
            |mut host| {
                let input = CallInput::new(USER, PARENT_SC, "parentFunctionChildCall", 1_000_000);
                black_box(host.run_call(input).unwrap())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_recursive_chain,
    bench_async_round_trip,
    bench_same_context_output
);
criterion_main!(benches);
