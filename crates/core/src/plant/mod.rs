//! Double-inverted-pendulum dynamics.
//!
//! State layout is `[x, th1, th2, xdot, th1dot, th2dot]` with angles
//! measured from the upward vertical. Both models expose the same
//! interface; the simplified one is meant for fast tuning loops, the full
//! one for validation runs.

mod full;
mod simplified;

pub use full::FullDip;
pub use simplified::SimplifiedDip;

use nalgebra::{Matrix3, Vector3, Vector6};
use static_assertions::const_assert_eq;

use crate::config::PhysicsParams;
use crate::error::CoreError;
use crate::numeric::AdaptiveInverter;

/// Generalized coordinates: cart position plus two joint angles.
pub const DOF: usize = 3;
/// Full state dimension.
pub const STATE_DIM: usize = 6;
const_assert_eq!(STATE_DIM, 2 * DOF);

pub type State = Vector6<f64>;

/// Input matrix `B = [1, 0, 0]^T`: the actuator pushes the cart only.
pub fn input_matrix() -> Vector3<f64> {
    Vector3::new(1.0, 0.0, 0.0)
}

/// A rigid-body model of the cart / double-pendulum system.
///
/// `matrices` returns the manipulator form `M(q) qdd + C(q, qd) qd + G(q)
/// = B u`. The provided `rhs` and `step_rk4` turn that into a first-order
/// ODE and integrate it; both report singular or non-finite evaluations as
/// [`CoreError::SingularPlant`] so the simulator can invalidate the
/// trajectory.
pub trait DipModel: Send + Sync {
    fn params(&self) -> &PhysicsParams;

    fn inverter(&self) -> &AdaptiveInverter;

    /// Inertia, Coriolis/damping and gravity terms at the given state.
    fn matrices(&self, x: &State) -> (Matrix3<f64>, Matrix3<f64>, Vector3<f64>);

    /// Total mechanical energy of the free system (used by conservation
    /// tests; friction and input are external to this quantity).
    fn energy(&self, x: &State) -> f64 {
        let (m, _, _) = self.matrices(x);
        let qd = x.fixed_rows::<3>(3).into_owned();
        let kinetic = 0.5 * qd.dot(&(m * qd));
        let p = self.params();
        let h1 = p.m1 * p.lc1 + p.m2 * p.l1;
        let h2 = p.m2 * p.lc2;
        let potential = h1 * p.g * x[1].cos() + h2 * p.g * x[2].cos();
        kinetic + potential
    }

    /// Right-hand side of the first-order ODE, `xdot = f(x, u)`.
    fn rhs(&self, x: &State, u: f64) -> Result<State, CoreError> {
        let (m, c, g) = self.matrices(x);
        let m_inv = self.inverter().invert(&m)?;
        let qd = x.fixed_rows::<3>(3).into_owned();
        let qdd = m_inv * (input_matrix() * u - c * qd - g);
        let out = State::new(qd[0], qd[1], qd[2], qdd[0], qdd[1], qdd[2]);
        if out.iter().all(|v| v.is_finite()) {
            Ok(out)
        } else {
            Err(CoreError::SingularPlant {
                cond: f64::INFINITY,
                max: self.params().kappa_max,
            })
        }
    }

    /// Classical fourth-order Runge-Kutta step with `u` held constant
    /// across the four stages.
    fn step_rk4(&self, x: &State, u: f64, dt: f64) -> Result<State, CoreError> {
        let k1 = self.rhs(x, u)?;
        let k2 = self.rhs(&(x + k1 * (dt / 2.0)), u)?;
        let k3 = self.rhs(&(x + k2 * (dt / 2.0)), u)?;
        let k4 = self.rhs(&(x + k3 * dt), u)?;
        let next = x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0);
        if next.iter().all(|v| v.is_finite()) {
            Ok(next)
        } else {
            Err(CoreError::SingularPlant {
                cond: f64::INFINITY,
                max: self.params().kappa_max,
            })
        }
    }
}

/// Coupling coefficients shared by both models.
///
/// `h1` and `h2` weight the cart/pendulum coupling, `h3` the
/// pendulum/pendulum coupling.
pub(crate) fn couplings(p: &PhysicsParams) -> (f64, f64, f64) {
    let h1 = p.m1 * p.lc1 + p.m2 * p.l1;
    let h2 = p.m2 * p.lc2;
    let h3 = p.m2 * p.l1 * p.lc2;
    (h1, h2, h3)
}
