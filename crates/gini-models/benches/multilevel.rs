//! Criterion benchmarks for the multilevel sampler.
//!
//! Synthetic state-sized input: 58 counties with uneven tract counts.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gini_data::{Tract, TractSet};
use gini_models::multilevel::gibbs::{ModelData, run_chain};
use gini_models::{MultilevelConfig, MultilevelModel};
use std::hint::black_box;

fn make_tracts(counties: usize, tracts_per_county: usize) -> TractSet {
    (0..counties)
        .flat_map(|c| {
            // Uneven sizes: 1 to tracts_per_county tracts
            let n = 1 + (c * 7) % tracts_per_county;
            (0..n).map(move |i| {
                let value = 300_000.0 + 40_000.0 * ((c + i) % 11) as f64;
                let gini = 0.38 + 0.002 * (c % 13) as f64 + 0.01 * ((i * 3) % 5) as f64;
                Tract::new(
                    format!("06{:03}{:06}", 2 * c + 1, i + 1),
                    format!("County {}", c),
                    gini,
                    value,
                )
                .expect("valid synthetic tract")
            })
        })
        .collect()
}

fn bench_single_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("gibbs_chain");
    for &size in &[20_usize, 150] {
        let tracts = make_tracts(58, size);
        let data = ModelData::from_tracts(&tracts, true).expect("model data");
        let config = MultilevelConfig {
            chains: 1,
            iterations: 500,
            warmup: 250,
            include_home_value: true,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(tracts.len()), &data, |b, data| {
            b.iter(|| run_chain(black_box(data), &config, 1).expect("chain"));
        });
    }
    group.finish();
}

fn bench_parallel_fit(c: &mut Criterion) {
    let tracts = make_tracts(58, 150);
    let model = MultilevelModel::new(MultilevelConfig {
        chains: 4,
        iterations: 500,
        warmup: 250,
        ..Default::default()
    });
    c.bench_function("multilevel_fit_4_chains", |b| {
        b.iter(|| model.fit(black_box(&tracts)).expect("fit"));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_single_chain, bench_parallel_fit
}
criterion_main!(benches);
