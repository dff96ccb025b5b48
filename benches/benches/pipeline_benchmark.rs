//! Aggregation, upsert and full-cycle throughput.
//!
//! Run with: `cargo bench --package candela-bench`

use std::sync::Arc;

use candela_bench::{bench_symbol, series_start, synthetic_ticks};
use candela_lib::{
    CandleAggregator, CandleWriter, FlushReason, MarketCalendar, MemorySource, PipelineConfig,
    StoreLayout, SymbolWorker, Timeframe,
};
use chrono::TimeDelta;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

const TICKS: usize = 200_000;
const STEP_MS: i64 = 500;

fn aggregate_benchmark(c: &mut Criterion) {
    let symbol = bench_symbol().unwrap();
    let ticks = synthetic_ticks(TICKS, STEP_MS);

    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements(TICKS as u64));

    for timeframe in [Timeframe::M1, Timeframe::H1, Timeframe::D1] {
        group.bench_with_input(
            BenchmarkId::from_parameter(timeframe),
            &timeframe,
            |b, &timeframe| {
                b.iter(|| {
                    let aggregator =
                        CandleAggregator::new(symbol.clone(), timeframe, MarketCalendar::utc())
                            .unwrap();
                    let mut candles = aggregator.candles(ticks.iter().copied());
                    let closed = candles.by_ref().filter_map(Result::ok).count();
                    let mut aggregator = candles.into_aggregator();
                    closed + usize::from(aggregator.flush(FlushReason::MarketClosed).is_some())
                });
            },
        );
    }
    group.finish();
}

fn upsert_benchmark(c: &mut Criterion) {
    let symbol = bench_symbol().unwrap();
    let aggregator = CandleAggregator::new(symbol.clone(), Timeframe::M1, MarketCalendar::utc())
        .unwrap();
    let candles: Vec<_> = aggregator
        .candles(synthetic_ticks(TICKS, STEP_MS))
        .filter_map(Result::ok)
        .collect();

    let mut group = c.benchmark_group("upsert");
    group.sample_size(20);

    for existing in [0_usize, candles.len() / 2] {
        group.throughput(Throughput::Elements(candles.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("existing", existing),
            &existing,
            |b, &existing| {
                let dir = TempDir::new().unwrap();
                let writer = CandleWriter::new(StoreLayout::new(dir.path()));
                b.iter(|| {
                    writer.remove(&symbol, Timeframe::M1).unwrap();
                    if existing > 0 {
                        writer
                            .upsert_candles(&symbol, Timeframe::M1, &candles[..existing])
                            .unwrap();
                    }
                    writer
                        .upsert_candles(&symbol, Timeframe::M1, &candles)
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn cycle_benchmark(c: &mut Criterion) {
    let symbol = bench_symbol().unwrap();
    let ticks = synthetic_ticks(TICKS, STEP_MS);
    let end = series_start() + TimeDelta::milliseconds(STEP_MS * TICKS as i64);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let source = Arc::new(MemorySource::new());
    source.push_ticks(&symbol, ticks);

    let mut group = c.benchmark_group("cycle");
    group.sample_size(10);
    group.throughput(Throughput::Elements(TICKS as u64));
    group.bench_function("backfill_m1_h1_d1", |b| {
        b.to_async(&runtime).iter(|| {
            let source = Arc::clone(&source);
            let symbol = symbol.clone();
            async move {
                let dir = TempDir::new().unwrap();
                let mut config = PipelineConfig::new(
                    vec![symbol.clone()],
                    vec![Timeframe::M1, Timeframe::H1, Timeframe::D1],
                    series_start(),
                    dir.path(),
                );
                config.settle_delay = 0;
                let mut worker = SymbolWorker::new(&config, symbol, source);
                worker.run_cycle(end).await.candles()
            }
        });
    });
    group.finish();
}

criterion_group!(benches, aggregate_benchmark, upsert_benchmark, cycle_benchmark);
criterion_main!(benches);
