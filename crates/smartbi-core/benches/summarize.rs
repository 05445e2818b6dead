//! Benchmarks for the data summarizer.
//!
//! Measures rendering of extracted reports into prompt text, both when the
//! whole report fits the character budget and when it has to be cut.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use smartbi_core::summary::{summarize_extraction, SummaryOptions};
use smartbi_testutil::wide_extraction;

fn bench_summarize_fits(c: &mut Criterion) {
    let mut group = c.benchmark_group("summary/fits");
    let options = SummaryOptions {
        char_budget: 100_000_000,
        rows_per_table: 50,
    };

    for tables in [5, 20, 80] {
        let extraction = wide_extraction(tables, 50);
        group.throughput(Throughput::Elements((tables * 50) as u64));
        group.bench_with_input(BenchmarkId::new("tables", tables), &extraction, |b, e| {
            b.iter(|| summarize_extraction(e, &options))
        });
    }
    group.finish();
}

fn bench_summarize_truncated(c: &mut Criterion) {
    let mut group = c.benchmark_group("summary/truncated");
    let extraction = wide_extraction(200, 200);

    for budget in [10_000, 100_000] {
        let options = SummaryOptions {
            char_budget: budget,
            rows_per_table: 200,
        };
        group.bench_with_input(BenchmarkId::new("budget", budget), &options, |b, o| {
            b.iter(|| summarize_extraction(&extraction, o))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_summarize_fits, bench_summarize_truncated);
criterion_main!(benches);
