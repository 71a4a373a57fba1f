use criterion::{black_box, criterion_group, criterion_main, Criterion};
use muxsql_core::murmur::{murmur3_32, scuttle_id, SCUTTLE_SEED};

fn murmur_bench(c: &mut Criterion) {
    let payload = b"The quick brown fox jumps over the lazy dog";
    c.bench_function("murmur3_32", |b| {
        b.iter(|| murmur3_32(black_box(payload), SCUTTLE_SEED));
    });
    c.bench_function("scuttle_id_numeric", |b| {
        b.iter(|| scuttle_id(black_box(b"1703900906402232986")));
    });
}

criterion_group!(hash_benches, murmur_bench);
criterion_main!(hash_benches);
