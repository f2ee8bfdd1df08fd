//! Classical sliding-mode controller:
//! `u = u_eq - K * phi(sigma/eps) - k_d * sigma`.

use smallvec::SmallVec;

use crate::config::{ClassicalConfig, PhysicsParams};
use crate::error::CoreError;
use crate::factory::ControllerKind;
use crate::plant::{FullDip, State};
use crate::smc::equivalent::EquivalentControl;
use crate::smc::surface::SlidingSurface;
use crate::smc::{
    channel_direction, ControlOutput, Controller, ControllerMode, SaturationTracker,
};

/// Gain order: `[k1, k2, lam1, lam2, K, kd]`.
#[derive(Debug, Clone)]
pub struct ClassicalSmc {
    cfg: ClassicalConfig,
    surface: SlidingSurface,
    eq: EquivalentControl,
    model: FullDip,
    /// Switching gain.
    k_switch: f64,
    /// Sliding-variable damping.
    k_d: f64,
    dir0: f64,
    dir: f64,
    sat: SaturationTracker,
    prev_u: f64,
}

impl ClassicalSmc {
    pub const GAIN_COUNT: usize = 6;

    pub fn new(
        physics: PhysicsParams,
        cfg: ClassicalConfig,
        gains: &[f64],
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        let invalid = |reason: String| CoreError::InvalidGains {
            kind: ControllerKind::ClassicalSmc.as_str().to_string(),
            reason,
        };
        if gains.len() != Self::GAIN_COUNT {
            return Err(invalid(format!(
                "expected {} gains, got {}",
                Self::GAIN_COUNT,
                gains.len()
            )));
        }
        let surface = SlidingSurface::new(gains[2], gains[3], gains[0], gains[1]).map_err(invalid)?;
        let (k_switch, k_d) = (gains[4], gains[5]);
        if !(k_switch.is_finite() && k_switch >= 0.0) {
            return Err(invalid("switching gain K must be >= 0".to_string()));
        }
        if !(k_d.is_finite() && k_d >= 0.0) {
            return Err(invalid("damping gain kd must be >= 0".to_string()));
        }
        let model = FullDip::new(physics)?;
        let eq = EquivalentControl::default();
        let dir0 = channel_direction(&model, &eq, &surface)?;
        let n_sat = cfg.n_sat;
        Ok(Self {
            cfg,
            surface,
            eq,
            model,
            k_switch,
            k_d,
            dir0,
            dir: dir0,
            sat: SaturationTracker::new(n_sat),
            prev_u: 0.0,
        })
    }
}

impl Controller for ClassicalSmc {
    fn compute_control(&mut self, x: &State, dt: f64) -> ControlOutput {
        let sigma = self.surface.sigma(x);
        if !sigma.is_finite() {
            return ControlOutput::invalid(sigma);
        }
        let Some(sol) = self.eq.solve(&self.model, &self.surface, x) else {
            return ControlOutput::invalid(sigma);
        };
        if sol.beta.abs() >= self.eq.beta_min {
            self.dir = sol.beta.signum();
        }

        let phi = self.cfg.switching.phi(sigma, self.cfg.eps);
        let u_raw = sol.u_eq - self.dir * (self.k_switch * phi + self.k_d * sigma);
        let u = u_raw.clamp(-self.cfg.u_max, self.cfg.u_max);
        let saturated = self.sat.observe(u_raw, self.cfg.u_max);
        let du = if dt > 0.0 { (u - self.prev_u) / dt } else { 0.0 };
        self.prev_u = u;

        ControlOutput {
            u,
            sigma,
            du,
            mode: if saturated {
                ControllerMode::Saturated
            } else {
                ControllerMode::Normal
            },
            valid: true,
            adaptive_gains: SmallVec::new(),
        }
    }

    fn reset(&mut self) {
        self.sat.clear();
        self.dir = self.dir0;
        self.prev_u = 0.0;
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::ClassicalSmc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::DipModel;

    fn controller() -> ClassicalSmc {
        ClassicalSmc::new(
            PhysicsParams::nominal(),
            ClassicalConfig::default(),
            &[10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn control_is_finite_and_clipped() {
        let mut c = controller();
        let out = c.compute_control(&State::new(0.0, 0.1, -0.1, 0.0, 0.0, 0.0), 1e-3);
        assert!(out.valid);
        assert!(out.u.is_finite());
        assert!(out.u.abs() <= 150.0);
    }

    #[test]
    fn switching_opposes_the_sliding_variable() {
        let mut c = controller();
        let x = State::new(0.0, 0.1, 0.1, 0.0, 0.0, 0.0);
        let out = c.compute_control(&x, 1e-3);
        // The switching term must drive sigma toward zero: after a short
        // plant step under this control, |sigma| may not grow faster than
        // the drift alone would allow.
        let next = c.model.step_rk4(&x, out.u, 1e-3).unwrap();
        let free = c.model.step_rk4(&x, 0.0, 1e-3).unwrap();
        let s_next = c.surface.sigma(&next).abs();
        let s_free = c.surface.sigma(&free).abs();
        assert!(s_next < s_free, "controlled {s_next} vs free {s_free}");
    }

    #[test]
    fn wrong_gain_count_is_rejected() {
        let err = ClassicalSmc::new(
            PhysicsParams::nominal(),
            ClassicalConfig::default(),
            &[1.0, 2.0],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGains { .. }));
    }

    #[test]
    fn non_finite_state_is_reported_invalid() {
        let mut c = controller();
        let out = c.compute_control(&State::new(0.0, f64::NAN, 0.0, 0.0, 0.0, 0.0), 1e-3);
        assert!(!out.valid);
        assert_eq!(out.u, 0.0);
        assert_eq!(out.mode, ControllerMode::Invalid);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut c = controller();
        c.compute_control(&State::new(0.0, 0.2, 0.0, 0.0, 0.0, 0.0), 1e-3);
        c.reset();
        let first = c.compute_control(&State::new(0.0, 0.1, 0.0, 0.0, 0.0, 0.0), 1e-3);
        c.reset();
        c.reset();
        let second = c.compute_control(&State::new(0.0, 0.1, 0.0, 0.0, 0.0, 0.0), 1e-3);
        assert_eq!(first.u, second.u);
    }
}
