use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crossfilterx_engine::csr::CsrIndex;

fn build_column(rows: usize, bin_count: u16) -> Vec<u16> {
    (0..rows).map(|r| (r % bin_count as usize) as u16).collect()
}

fn csr_scan_benchmark(c: &mut Criterion) {
    let rows = 1_000_000;
    let bin_count = 256u16;
    let column = build_column(rows, bin_count);
    let csr = CsrIndex::build(&column, bin_count as usize);

    let mut group = c.benchmark_group("csr_scan");
    group.bench_function("build", |b| {
        b.iter(|| CsrIndex::build(black_box(&column), black_box(bin_count as usize)))
    });
    group.bench_function("rows_in_range narrow", |b| {
        b.iter(|| black_box(csr.rows_in_range(black_box(0), black_box(3))))
    });
    group.bench_function("rows_in_range wide", |b| {
        b.iter(|| black_box(csr.rows_in_range(black_box(0), black_box(bin_count - 2))))
    });
    group.finish();
}

criterion_group!(benches, csr_scan_benchmark);
criterion_main!(benches);
