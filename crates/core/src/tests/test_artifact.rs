//! Artifact round-trip: a persisted gains record reconstructs a controller
//! whose re-simulated cost reproduces the recorded cost.

use crate::artifact::GainsRecord;
use crate::batch::simulate;
use crate::config::{CostWeights, PhysicsParams, PsoConfig, SimConfig};
use crate::cost::{aggregate, trajectory_cost};
use crate::factory::{default_registry, ControllerKind};
use crate::plant::FullDip;
use crate::tuner::tune;

fn sim() -> SimConfig {
    SimConfig {
        dt: 1e-3,
        steps: 250,
        x0: [0.0, 0.05, -0.05, 0.0, 0.0, 0.0],
        u_max: 150.0,
        timeout: None,
    }
}

#[test]
fn recorded_cost_is_reproduced_by_resimulation() {
    let physics = PhysicsParams::nominal();
    let weights = CostWeights::default();
    let registry = default_registry(physics.clone()).unwrap();
    let pso = PsoConfig::new(5, 4, 2024);

    let result = tune(
        registry,
        ControllerKind::ClassicalSmc,
        sim(),
        weights.clone(),
        pso,
    )
    .unwrap();
    let record = GainsRecord::from_result(ControllerKind::ClassicalSmc, &result, &physics)
        .expect("run produced a best candidate");

    // Through JSON and back, as a collaborator would load it.
    let json = serde_json::to_string_pretty(&record).unwrap();
    let loaded: GainsRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded, record);

    // Rebuild the controller from the record and re-simulate.
    let registry = default_registry(loaded.physics.clone()).unwrap();
    let mut ctrl = registry.create(loaded.kind, &loaded.gains).unwrap();
    let model = FullDip::new(loaded.physics.clone()).unwrap();
    let cfg = sim();
    let traj = simulate(&model, ctrl.as_mut(), &cfg.initial_state(), &cfg);
    let j = trajectory_cost(&traj, &weights);
    // Single nominal draw with the default (0.7, 0.3) blend is the plain
    // cost, so the match is exact up to float identity.
    let j = aggregate(&[j], 0.7, 0.3);
    assert!(
        (j - loaded.cost).abs() < 1e-9,
        "resimulated {j} vs recorded {}",
        loaded.cost
    );
}

#[test]
fn iteration_count_excludes_the_initial_evaluation() {
    let physics = PhysicsParams::nominal();
    let registry = default_registry(physics.clone()).unwrap();
    let result = tune(
        registry,
        ControllerKind::ClassicalSmc,
        sim(),
        CostWeights::default(),
        PsoConfig::new(4, 3, 5),
    )
    .unwrap();
    let record = GainsRecord::from_result(ControllerKind::ClassicalSmc, &result, &physics).unwrap();
    assert!(record.iterations <= 3);
}
