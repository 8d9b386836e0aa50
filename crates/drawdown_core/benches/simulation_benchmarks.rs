//! Criterion benchmarks for drawdown_core simulation
//!
//! Run with: cargo bench -p drawdown_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use drawdown_core::analysis::{SweepFactor, factorize};
use drawdown_core::config::SimulationConfig;
use drawdown_core::distribution::{
    AssetChanges, AssetDistributions, EmpiricalDistribution, synthetic_changes,
};
use drawdown_core::model::{Model, WithdrawalStrategy};
use drawdown_core::simulation::{Portfolio, run_model, simulate_path};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn create_changes(seed: u64) -> AssetChanges {
    let mut rng = SmallRng::seed_from_u64(seed);
    AssetChanges {
        equities: synthetic_changes(0.6, 4.0, 10_000, &mut rng).unwrap(),
        bonds: synthetic_changes(0.3, 1.5, 10_000, &mut rng).unwrap(),
        bills: synthetic_changes(0.1, 0.3, 10_000, &mut rng).unwrap(),
    }
}

fn bench_distribution_build(c: &mut Criterion) {
    let changes = create_changes(1);

    c.bench_function("distribution_build_200_bins", |b| {
        b.iter(|| EmpiricalDistribution::build("equities", black_box(&changes.equities), 200))
    });
}

fn bench_distribution_sample(c: &mut Criterion) {
    let changes = create_changes(2);
    let distribution = EmpiricalDistribution::build("equities", &changes.equities, 200);
    let mut rng = SmallRng::seed_from_u64(42);

    c.bench_function("distribution_sample", |b| {
        b.iter(|| distribution.sample(black_box(&mut rng)))
    });
}

fn bench_single_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_path");
    let config = SimulationConfig::default();
    let distributions = AssetDistributions::build("bench", &create_changes(3), config.bins);

    for strategy in WithdrawalStrategy::ALL {
        let model = Model::new(strategy, 60, 30, 4.0, 12, &config);
        group.bench_with_input(
            BenchmarkId::new("strategy", strategy.id()),
            &model,
            |b, model| {
                let mut rng = SmallRng::seed_from_u64(42);
                b.iter(|| {
                    simulate_path(
                        black_box(model),
                        black_box(&distributions),
                        &config,
                        0,
                        &mut rng,
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_run_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_model");
    let config = SimulationConfig::default();
    let distributions = AssetDistributions::build("bench", &create_changes(4), config.bins);

    for repeats in [100, 500, 1000].iter() {
        let mut model = Model::new(WithdrawalStrategy::Fixed, 60, 30, 4.0, 0, &config);
        model.repeats = *repeats;

        group.bench_with_input(BenchmarkId::new("repeats", repeats), repeats, |b, _| {
            b.iter(|| {
                run_model(
                    black_box(&model),
                    Portfolio::Single(&distributions),
                    &config,
                    black_box(42),
                )
            })
        });
    }

    group.finish();
}

fn bench_factorize(c: &mut Criterion) {
    let config = SimulationConfig::default();
    let factors = [
        SweepFactor::Strategy,
        SweepFactor::WithdrawalRate,
        SweepFactor::Equity,
        SweepFactor::Bonds,
    ];

    c.bench_function("factorize_full_grid", |b| {
        b.iter(|| factorize(black_box(&factors), black_box(&config.sweep)))
    });
}

criterion_group!(
    benches,
    bench_distribution_build,
    bench_distribution_sample,
    bench_single_path,
    bench_run_model,
    bench_factorize,
);
criterion_main!(benches);
