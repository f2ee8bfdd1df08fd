//! Adaptive sliding-mode controller: the switching gain grows with |sigma|
//! outside a dead zone and leaks back toward its initial value, with a rate
//! limit and hard bounds.

use smallvec::smallvec;

use crate::config::{AdaptiveConfig, PhysicsParams};
use crate::error::CoreError;
use crate::factory::ControllerKind;
use crate::plant::{FullDip, State};
use crate::smc::equivalent::EquivalentControl;
use crate::smc::surface::SlidingSurface;
use crate::smc::{
    channel_direction, ControlOutput, Controller, ControllerMode, SaturationTracker,
};

/// Gain order: `[k1, k2, lam1, lam2, alpha]`; the adaptation rate lives in
/// [`AdaptiveConfig`], the tunable fifth gain is the proportional sliding
/// term.
#[derive(Debug, Clone)]
pub struct AdaptiveSmc {
    cfg: AdaptiveConfig,
    surface: SlidingSurface,
    eq: EquivalentControl,
    model: FullDip,
    alpha: f64,
    dir0: f64,
    dir: f64,
    /// Adaptive switching gain, clamped to `[k_min, k_max]`.
    k: f64,
    sat: SaturationTracker,
    prev_u: f64,
}

impl AdaptiveSmc {
    pub const GAIN_COUNT: usize = 5;

    pub fn new(
        physics: PhysicsParams,
        cfg: AdaptiveConfig,
        gains: &[f64],
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        let invalid = |reason: String| CoreError::InvalidGains {
            kind: ControllerKind::AdaptiveSmc.as_str().to_string(),
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
        let alpha = gains[4];
        if !(alpha.is_finite() && alpha >= 0.0) {
            return Err(invalid("proportional term alpha must be >= 0".to_string()));
        }
        let model = FullDip::new(physics)?;
        let eq = EquivalentControl::default();
        let dir0 = channel_direction(&model, &eq, &surface)?;
        let k = cfg.k_init;
        let n_sat = cfg.n_sat;
        Ok(Self {
            cfg,
            surface,
            eq,
            model,
            alpha,
            dir0,
            dir: dir0,
            k,
            sat: SaturationTracker::new(n_sat),
            prev_u: 0.0,
        })
    }

    /// Current adaptive gain (telemetry).
    pub fn gain(&self) -> f64 {
        self.k
    }

    fn adapt(&mut self, sigma: f64, dt: f64) {
        let leak = self.cfg.leak * (self.k - self.cfg.k_init);
        let kdot = if sigma.abs() > self.cfg.dead_zone {
            self.cfg.gamma * sigma.abs() - leak
        } else {
            // Inside the dead zone only the leak acts, so the gain cannot
            // wind up on noise.
            -leak
        };
        let kdot = kdot.clamp(-self.cfg.rate_limit, self.cfg.rate_limit);
        self.k = (self.k + kdot * dt).clamp(self.cfg.k_min, self.cfg.k_max);
    }
}

impl Controller for AdaptiveSmc {
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
        let u_raw = sol.u_eq - self.dir * (self.k * phi + self.alpha * sigma);
        self.adapt(sigma, dt);

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
            adaptive_gains: smallvec![self.k],
        }
    }

    fn reset(&mut self) {
        self.k = self.cfg.k_init;
        self.sat.clear();
        self.dir = self.dir0;
        self.prev_u = 0.0;
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::AdaptiveSmc
    }
}
