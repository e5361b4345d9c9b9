use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crosscall_types::{Address, U256};
use crosscall_vm::call_data::{build, parse};

fn bench_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("address");
    let addr = Address::from_padded_name("childSC").unwrap();
    let encoded = addr.to_string();

    group.bench_function("to_string", |b| b.iter(|| black_box(addr.to_string())));
    group.bench_function("parse_bech32", |b| {
        b.iter(|| black_box(encoded.parse::<Address>().unwrap()))
    });
    group.bench_function("parse_padded_name", |b| {
        b.iter(|| black_box("childSC".parse::<Address>().unwrap()))
    });
    group.finish();
}

fn bench_u256_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("u256");
    let a = U256::from(123456789u64);
    let b = U256::from(987654321u64);

    group.bench_function("checked_add", |bencher| {
        bencher.iter(|| black_box(a.checked_add(&b)))
    });
    group.bench_function("checked_sub", |bencher| {
        bencher.iter(|| black_box(b.checked_sub(&a)))
    });
    group.finish();
}

fn bench_call_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("call_data");
    let arguments: Vec<Vec<u8>> = (0..8).map(|i| vec![i; 32]).collect();
    let data = build("transferToThirdParty", &arguments);

    group.bench_function("build_8_args", |b| {
        b.iter(|| black_box(build("transferToThirdParty", &arguments)))
    });
    group.bench_function("parse_8_args", |b| b.iter(|| black_box(parse(&data).unwrap())));
    group.finish();
}

criterion_group!(benches, bench_address, bench_u256_ops, bench_call_data);
criterion_main!(benches);
