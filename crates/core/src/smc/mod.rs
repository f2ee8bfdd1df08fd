//! Sliding-mode controller family.
//!
//! The variants compose the same value-typed primitives: a sliding surface,
//! a switching function and an optional model-based equivalent control.
//! Each controller owns its state exclusively and exposes `reset()`; there
//! is no shared mutable state between controllers of a batch.

pub mod adaptive;
pub mod classical;
pub mod equivalent;
pub mod hybrid;
pub mod sta;
pub mod surface;
pub mod switching;

pub use adaptive::AdaptiveSmc;
pub use classical::ClassicalSmc;
pub use hybrid::HybridAdaptiveStaSmc;
pub use sta::SuperTwistingSmc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CoreError;
use crate::factory::{ControllerKind, GainSpec};
use crate::plant::{DipModel, State};
use equivalent::EquivalentControl;
use surface::SlidingSurface;

/// Discrete operating mode reported with every control sample.
///
/// Only the hybrid variant ever reaches `ResetPending`/`ResetFired`;
/// `Invalid` is terminal within a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    Normal,
    Saturated,
    ResetPending,
    ResetFired,
    Invalid,
}

/// One control sample plus telemetry.
#[derive(Debug, Clone)]
pub struct ControlOutput {
    /// Control force, already clipped to the actuator limit.
    pub u: f64,
    /// Sliding variable at this state.
    pub sigma: f64,
    /// Control rate `(u - u_prev) / dt`.
    pub du: f64,
    pub mode: ControllerMode,
    /// False when the sliding variable is non-finite or the plant inversion
    /// failed; the simulator invalidates the trajectory.
    pub valid: bool,
    /// Current adaptive gains, variant-specific ordering.
    pub adaptive_gains: SmallVec<[f64; 2]>,
}

impl ControlOutput {
    pub(crate) fn invalid(sigma: f64) -> Self {
        Self {
            u: 0.0,
            sigma,
            du: 0.0,
            mode: ControllerMode::Invalid,
            valid: false,
            adaptive_gains: SmallVec::new(),
        }
    }
}

/// Common contract of all controller variants.
pub trait Controller: Send + std::fmt::Debug {
    /// Compute the control for the current state and advance the internal
    /// controller state by one step of length `dt`.
    fn compute_control(&mut self, x: &State, dt: f64) -> ControlOutput;

    /// Return the internal state to its initial configuration. Idempotent.
    fn reset(&mut self);

    fn kind(&self) -> ControllerKind;

    /// Class-level gain specification: documented bounds and the variant
    /// validator for this controller's kind.
    fn gain_spec(&self) -> &'static GainSpec {
        self.kind().gain_spec()
    }
}

/// Consecutive-saturation counter backing the `Saturated` mode.
#[derive(Debug, Clone)]
pub(crate) struct SaturationTracker {
    threshold: usize,
    run: usize,
}

impl SaturationTracker {
    pub(crate) fn new(threshold: usize) -> Self {
        Self { threshold, run: 0 }
    }

    /// Observe the unclipped control; returns true once the run length
    /// reaches the threshold.
    pub(crate) fn observe(&mut self, u_raw: f64, u_max: f64) -> bool {
        if u_raw.abs() >= u_max {
            self.run += 1;
        } else {
            self.run = 0;
        }
        self.run >= self.threshold
    }

    pub(crate) fn clear(&mut self) {
        self.run = 0;
    }
}

/// Sign of the controllability scalar at the upright equilibrium.
///
/// Orients the switching terms so that the reaching condition
/// `sigma * sigma_dot < 0` holds with positive gains regardless of the
/// geometric sign of `L * M^-1 * B` for the given plant.
pub(crate) fn channel_direction(
    model: &dyn DipModel,
    eq: &EquivalentControl,
    surface: &SlidingSurface,
) -> Result<f64, CoreError> {
    let sol = eq
        .solve(model, surface, &State::zeros())
        .ok_or_else(|| CoreError::config("physics", "plant is singular at the upright equilibrium"))?;
    Ok(if sol.beta >= 0.0 { 1.0 } else { -1.0 })
}
