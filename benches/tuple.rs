//! Criterion benchmarks for the hot tuple paths.
//!
//! Run with:
//!   cargo bench --bench tuple

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packtup::{TupleBuilder, TypeFilter, TypeTag, BUFFER_ENOUGH};

fn fill(t: &mut TupleBuilder<'_>, fields: usize) {
    for i in 0..fields as u16 {
        match i % 4 {
            0 => t.insert_uint16(i, i).unwrap(),
            1 => t.insert_uint32(i, u32::from(i)).unwrap(),
            2 => t.insert_uint64(i, u64::from(i) << 20).unwrap(),
            _ => t.insert_cstr(i, "bench payload").unwrap(),
        }
    }
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    let mut space = vec![0u8; BUFFER_ENOUGH];

    for &fields in &[8usize, 64, 512] {
        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::new("mixed", fields), &fields, |b, &fields| {
            b.iter(|| {
                let mut t = TupleBuilder::init(&mut space, fields).unwrap();
                fill(&mut t, fields);
                t.field_count()
            })
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let mut space = vec![0u8; BUFFER_ENOUGH];
    let mut t = TupleBuilder::init(&mut space, 512).unwrap();
    fill(&mut t, 512);
    let img = t.take();

    group.bench_function("exact_hit_first", |b| {
        b.iter(|| img.lookup(0, TypeTag::Uint16).is_some())
    });
    group.bench_function("exact_hit_last", |b| {
        b.iter(|| img.lookup(511, TypeTag::Cstr).is_some())
    });
    group.bench_function("filtered_scan", |b| {
        b.iter(|| {
            img.lookup_filtered(300, TypeFilter::UINT16 | TypeFilter::UINT64)
                .is_some()
        })
    });
    group.finish();
}

fn bench_shrink(c: &mut Criterion) {
    let mut group = c.benchmark_group("shrink");
    let mut space = vec![0u8; BUFFER_ENOUGH];

    for &fields in &[64usize, 512] {
        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(
            BenchmarkId::new("half_erased", fields),
            &fields,
            |b, &fields| {
                b.iter(|| {
                    let mut t = TupleBuilder::init(&mut space, fields).unwrap();
                    fill(&mut t, fields);
                    for i in (0..fields as u16).step_by(2) {
                        t.erase_all(i, TypeFilter::ANY);
                    }
                    t.shrink();
                    t.junk_units()
                })
            },
        );
    }
    group.finish();
}

fn bench_take(c: &mut Criterion) {
    let mut group = c.benchmark_group("take");
    let mut space = vec![0u8; BUFFER_ENOUGH];
    let mut t = TupleBuilder::init(&mut space, 512).unwrap();
    fill(&mut t, 512);

    group.bench_function("noshrink_512", |b| {
        b.iter(|| t.take_noshrink().total_bytes())
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_shrink, bench_take);
criterion_main!(benches);
