//! Factory contract tests across every registered kind.
//!
//! Tests cover:
//! - Mid-bounds construction succeeds for all kinds
//! - The constructed controller produces a finite, clipped control
//! - Unknown kinds and invalid gains surface the right errors

use crate::config::PhysicsParams;
use crate::error::CoreError;
use crate::factory::{default_registry, ControllerKind};
use crate::plant::State;
use crate::smc::Controller as _;

#[test]
fn every_kind_constructs_at_the_midpoint_of_its_bounds() {
    let registry = default_registry(PhysicsParams::nominal()).unwrap();
    let x0 = State::new(0.0, 0.05, -0.05, 0.0, 0.0, 0.0);

    for kind in ControllerKind::ALL {
        let mid = registry.gain_spec(kind).unwrap().midpoint();
        assert!(
            registry.validate_gains(kind, &mid),
            "midpoint gains fail validation for {kind}"
        );
        let mut ctrl = registry.create(kind, &mid).unwrap();
        ctrl.reset();
        let out = ctrl.compute_control(&x0, 1e-3);
        assert!(out.valid, "{kind} produced an invalid sample");
        assert!(out.u.is_finite());
        assert!(out.u.abs() <= 150.0, "{kind} exceeded the actuator limit");
        assert_eq!(ctrl.kind(), kind);
        // The class-level spec is reachable through the trait and agrees
        // with the registry's view.
        assert_eq!(ctrl.gain_spec().count(), mid.len());
        assert!(ctrl.gain_spec().validate(&mid).is_ok());
    }
}

#[test]
fn reset_then_compute_is_idempotent_for_every_kind() {
    let registry = default_registry(PhysicsParams::nominal()).unwrap();
    let x0 = State::new(0.0, 0.08, -0.02, 0.0, 0.0, 0.0);

    for kind in ControllerKind::ALL {
        let mid = registry.gain_spec(kind).unwrap().midpoint();
        let mut ctrl = registry.create(kind, &mid).unwrap();
        // Disturb the internal state, then reset twice.
        for _ in 0..25 {
            ctrl.compute_control(&x0, 1e-3);
        }
        ctrl.reset();
        let a = ctrl.compute_control(&x0, 1e-3);
        ctrl.reset();
        ctrl.reset();
        let b = ctrl.compute_control(&x0, 1e-3);
        assert_eq!(a.u, b.u, "reset is not idempotent for {kind}");
        assert_eq!(a.sigma, b.sigma);
    }
}

#[test]
fn gain_count_mismatch_names_the_problem() {
    let registry = default_registry(PhysicsParams::nominal()).unwrap();
    let err = registry
        .create(ControllerKind::StaSmc, &[1.0, 2.0, 3.0])
        .unwrap_err();
    match err {
        CoreError::InvalidGains { kind, reason } => {
            assert_eq!(kind, "sta_smc");
            assert!(reason.contains("expected 6 gains"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn per_kind_gain_dimensions_match_the_specs() {
    let registry = default_registry(PhysicsParams::nominal()).unwrap();
    let expected = [
        (ControllerKind::ClassicalSmc, 6),
        (ControllerKind::StaSmc, 6),
        (ControllerKind::AdaptiveSmc, 5),
        (ControllerKind::HybridAdaptiveStaSmc, 4),
    ];
    for (kind, dims) in expected {
        let spec = registry.gain_spec(kind).unwrap();
        assert_eq!(spec.count(), dims, "{kind}");
        assert_eq!(spec.names.len(), dims);
    }
}
