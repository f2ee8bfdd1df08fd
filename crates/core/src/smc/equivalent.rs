//! Model-based equivalent control.

use crate::plant::{input_matrix, DipModel, State};
use crate::smc::surface::SlidingSurface;

/// Default floor on the controllability scalar.
pub const BETA_MIN: f64 = 1e-4;

/// Result of an equivalent-control solve.
#[derive(Debug, Clone, Copy)]
pub struct EqSolution {
    /// Feedforward that would keep the state on `sigma = 0` for the exact
    /// model. Zero when the controllability scalar is below the floor.
    pub u_eq: f64,
    /// Controllability scalar `beta = L * M^-1 * B`.
    pub beta: f64,
}

/// Equivalent-control solver.
///
/// The feedforward is computed only when `|beta| >= beta_min`; near-zero
/// `beta` marks local loss of control authority and the solver falls back to
/// zero feedforward rather than dividing by it.
#[derive(Debug, Clone, Copy)]
pub struct EquivalentControl {
    pub beta_min: f64,
}

impl Default for EquivalentControl {
    fn default() -> Self {
        Self { beta_min: BETA_MIN }
    }
}

impl EquivalentControl {
    /// Solve for the feedforward at `x`. `None` means the plant inversion
    /// failed (singular inertia matrix or non-finite result); callers treat
    /// that as an invalid evaluation.
    pub fn solve(
        &self,
        model: &dyn DipModel,
        surface: &SlidingSurface,
        x: &State,
    ) -> Option<EqSolution> {
        let (m, c, g) = model.matrices(x);
        let m_inv = model.inverter().invert(&m).ok()?;
        let l = surface.projection();
        let beta = l.dot(&(m_inv * input_matrix()));
        if !beta.is_finite() {
            return None;
        }
        if beta.abs() < self.beta_min {
            return Some(EqSolution { u_eq: 0.0, beta });
        }
        let qd = x.fixed_rows::<3>(3).into_owned();
        let drift = m_inv * (c * qd + g);
        let u_eq = (l.dot(&drift) - surface.position_rate(x)) / beta;
        if u_eq.is_finite() {
            Some(EqSolution { u_eq, beta })
        } else {
            None
        }
    }
}
