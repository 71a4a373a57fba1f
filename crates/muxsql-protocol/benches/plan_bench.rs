use criterion::{black_box, criterion_group, criterion_main, Criterion};
use muxsql_protocol::plan_cache::{PlanCache, PlanEntry, PlanOptions, StatementCache};

fn plan_parse_bench(c: &mut Criterion) {
    let sql = "/* SHARDKEY=account_id(1),ScuttleId(3) */ \
               INSERT INTO ledger (account_id, amount, note, scuttle_id) VALUES (?, ?, 'why?', ?)";
    let options = PlanOptions {
        sharding_enabled: true,
        ..PlanOptions::default()
    };
    c.bench_function("plan_parse", |b| {
        b.iter(|| PlanEntry::parse(black_box(sql), &options, None).expect("parse"));
    });

    let cache = StatementCache::new(1000);
    c.bench_function("plan_cache_hit", |b| {
        b.iter(|| cache.entry(black_box(sql), &options).expect("entry"));
    });
}

criterion_group!(plan_benches, plan_parse_bench);
criterion_main!(plan_benches);
