//! Ranking and promotion benchmarks
//!
//! - Sorting candidate runs by a metric (with ties and missing values)
//! - Full `select` against an in-memory store
//! - Batch prediction throughput of the served model

use champion_registry::experiment::{MemoryRunStore, RunOrder, RunQuery, RunRecord, RunStore};
use champion_registry::features::{FeatureRecord, FeatureSchema, FeatureValue};
use champion_registry::registry::{tags, ChampionSelector};
use champion_registry::training::{Dataset, NearestCentroidTrainer, Predictor, Trainer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

/// Runs with f1 values drawn from 50 buckets (many ties), every 20th without the metric
#[allow(clippy::cast_precision_loss)]
fn create_runs(n: usize) -> Vec<RunRecord> {
    (0..n)
        .map(|i| {
            let builder = RunRecord::builder(format!("run-{:06}", (i * 7919) % n), "exp-1")
                .tag(tags::CANDIDATE, tags::TRUE);
            if i % 20 == 0 {
                builder.build()
            } else {
                builder.metric("f1", ((i * 31) % 50) as f64 / 50.0).build()
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn create_record(i: usize) -> FeatureRecord {
    FeatureRecord::from([
        ("Age".to_string(), FeatureValue::from(25.0 + (i % 40) as f64)),
        ("Total_Purchase".to_string(), FeatureValue::from(9_000.0 + (i % 700) as f64)),
        ("Account_Manager".to_string(), FeatureValue::from((i % 2) as f64)),
        ("Years".to_string(), FeatureValue::from((i % 9) as f64)),
        ("Num_Sites".to_string(), FeatureValue::from(3.0 + (i % 12) as f64)),
        ("Location".to_string(), FeatureValue::from(["Paris", "Lyon"][i % 2])),
        ("Company".to_string(), FeatureValue::from(["Acme", "Globex", "Hooli"][i % 3])),
    ])
}

fn bench_sort_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_runs");
    let order = RunOrder::descending("f1");

    for size in SIZES {
        let runs = create_runs(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &runs, |b, runs| {
            b.iter(|| RunQuery::sorted(black_box(runs.clone()), &order));
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_champion");
    group.sample_size(20);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for size in [100, 1_000] {
        let store = Arc::new(MemoryRunStore::new());
        let experiment = runtime
            .block_on(store.get_or_create_experiment("churn-day2"))
            .unwrap();
        for run in create_runs(size) {
            let mut builder = RunRecord::builder(run.run_id(), experiment.experiment_id())
                .tag(tags::CANDIDATE, tags::TRUE);
            if let Some(f1) = run.metric("f1") {
                builder = builder.metric("f1", f1);
            }
            store.insert_run(builder.build()).unwrap();
        }
        let selector = ChampionSelector::new(store);

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.to_async(&runtime)
                .iter(|| async { selector.select(black_box("churn-day2")).await.unwrap() });
        });
    }

    group.finish();
}

fn bench_predict_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_batch");

    let training: Vec<FeatureRecord> = (0..200).map(create_record).collect();
    let labels = training
        .iter()
        .map(|r| u8::from(r["Num_Sites"].as_number().unwrap_or_default() > 8.0))
        .collect();
    let model = NearestCentroidTrainer::new(FeatureSchema::churn())
        .fit(&Dataset::new(training, labels).unwrap())
        .unwrap();

    for size in SIZES {
        let batch: Vec<FeatureRecord> = (0..size).map(create_record).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| model.predict_batch(black_box(batch)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sort_runs, bench_select, bench_predict_batch);
criterion_main!(benches);
