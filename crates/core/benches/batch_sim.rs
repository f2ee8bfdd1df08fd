//! Throughput benchmark for the batch simulator.
//!
//! The batch dimension is the one the tuner scales with (swarm size times
//! perturbation draws), so regressions here dominate wall-clock tuning
//! time.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use diptune_core::batch::simulate_batch;
use diptune_core::config::{ClassicalConfig, PhysicsParams, SimConfig};
use diptune_core::plant::{FullDip, State};
use diptune_core::smc::{ClassicalSmc, Controller};

fn jobs(n: usize) -> Vec<(Box<dyn Controller>, State)> {
    let x0 = State::new(0.0, 0.05, -0.05, 0.0, 0.0, 0.0);
    (0..n)
        .map(|_| {
            let ctrl = ClassicalSmc::new(
                PhysicsParams::nominal(),
                ClassicalConfig::default(),
                &[10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
            )
            .unwrap();
            (Box::new(ctrl) as Box<dyn Controller>, x0)
        })
        .collect()
}

fn bench_batch(c: &mut Criterion) {
    let model = FullDip::new(PhysicsParams::nominal()).unwrap();
    let cfg = SimConfig {
        dt: 1e-3,
        steps: 500,
        x0: [0.0, 0.05, -0.05, 0.0, 0.0, 0.0],
        u_max: 150.0,
        timeout: None,
    };

    let mut group = c.benchmark_group("simulate_batch");
    for batch in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("classical", batch), &batch, |b, &n| {
            b.iter(|| {
                let out = simulate_batch(&model, jobs(n), black_box(&cfg));
                black_box(out.invalid_count())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
