//! Super-twisting controller: continuous control with the discontinuity
//! hidden inside an explicitly integrated internal state.
//!
//! `u = u_eq - K1 * sqrt(|sigma|) * phi(sigma/eps) + z`,
//! `z <- z - K2 * phi(sigma/eps) * dt`, |z| clamped.

use smallvec::SmallVec;

use crate::config::{PhysicsParams, StaConfig};
use crate::error::CoreError;
use crate::factory::ControllerKind;
use crate::plant::{FullDip, State};
use crate::smc::equivalent::EquivalentControl;
use crate::smc::surface::SlidingSurface;
use crate::smc::{
    channel_direction, ControlOutput, Controller, ControllerMode, SaturationTracker,
};

/// Gain order: `[K1, K2, k1, k2, lam1, lam2]`.
#[derive(Debug, Clone)]
pub struct SuperTwistingSmc {
    cfg: StaConfig,
    surface: SlidingSurface,
    eq: EquivalentControl,
    model: FullDip,
    kk1: f64,
    kk2: f64,
    dir0: f64,
    dir: f64,
    z: f64,
    sat: SaturationTracker,
    prev_u: f64,
}

impl SuperTwistingSmc {
    pub const GAIN_COUNT: usize = 6;

    /// Algorithmic-gain conditions checked against the declared disturbance
    /// bound and nominal controllability scale.
    pub fn validate_algorithmic_gains(kk1: f64, kk2: f64, cfg: &StaConfig) -> Result<(), String> {
        let ratio = cfg.d_bound / cfg.beta_scale;
        let k1_floor = 2.0 * (2.0 * ratio).sqrt();
        let k2_floor = ratio;
        if !(kk1.is_finite() && kk1 > k1_floor) {
            return Err(format!(
                "K1 must exceed 2*sqrt(2*d/beta) = {k1_floor:.4}, got {kk1}"
            ));
        }
        if !(kk2.is_finite() && kk2 > k2_floor) {
            return Err(format!("K2 must exceed d/beta = {k2_floor:.4}, got {kk2}"));
        }
        Ok(())
    }

    pub fn new(physics: PhysicsParams, cfg: StaConfig, gains: &[f64]) -> Result<Self, CoreError> {
        cfg.validate()?;
        let invalid = |reason: String| CoreError::InvalidGains {
            kind: ControllerKind::StaSmc.as_str().to_string(),
            reason,
        };
        if gains.len() != Self::GAIN_COUNT {
            return Err(invalid(format!(
                "expected {} gains, got {}",
                Self::GAIN_COUNT,
                gains.len()
            )));
        }
        let (kk1, kk2) = (gains[0], gains[1]);
        Self::validate_algorithmic_gains(kk1, kk2, &cfg).map_err(invalid)?;
        let surface = SlidingSurface::new(gains[4], gains[5], gains[2], gains[3]).map_err(invalid)?;
        let model = FullDip::new(physics)?;
        let eq = EquivalentControl::default();
        let dir0 = channel_direction(&model, &eq, &surface)?;
        let n_sat = cfg.n_sat;
        Ok(Self {
            cfg,
            surface,
            eq,
            model,
            kk1,
            kk2,
            dir0,
            dir: dir0,
            z: 0.0,
            sat: SaturationTracker::new(n_sat),
            prev_u: 0.0,
        })
    }

    /// Generalized Lyapunov candidate `|sigma| + z^2 / (2 K2)`.
    pub fn lyapunov(&self, sigma: f64) -> f64 {
        sigma.abs() + self.z * self.z / (2.0 * self.kk2)
    }
}

impl Controller for SuperTwistingSmc {
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
        let u_raw = sol.u_eq - self.dir * self.kk1 * sigma.abs().sqrt() * phi + self.z;
        // Explicit integrator update; the deprecated semi-implicit form is
        // intentionally not supported.
        self.z = (self.z - self.dir * self.kk2 * phi * dt).clamp(-self.cfg.z_max, self.cfg.z_max);

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
        self.z = 0.0;
        self.sat.clear();
        self.dir = self.dir0;
        self.prev_u = 0.0;
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::StaSmc
    }
}
