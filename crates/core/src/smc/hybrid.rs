//! Hybrid adaptive super-twisting controller.
//!
//! Sliding surface with cart terms, adaptive algorithmic gains `k1`/`k2`,
//! an independently saturated integral state, optional model feedforward
//! and a hysteresis-gated emergency reset. The reset shrinks the adaptive
//! gains toward their lower bound and zeroes the integrator; it requires
//! `n_hyst` consecutive violation steps and at least `t_reset` seconds
//! since the previous reset, which bounds the reset frequency.

use smallvec::smallvec;

use crate::config::{HybridConfig, PhysicsParams};
use crate::error::CoreError;
use crate::factory::ControllerKind;
use crate::plant::{FullDip, State};
use crate::smc::equivalent::EquivalentControl;
use crate::smc::surface::{CartTerms, SlidingSurface};
use crate::smc::{
    channel_direction, ControlOutput, Controller, ControllerMode, SaturationTracker,
};

/// Gain order: `[c1, lam1, c2, lam2]`; the surface is
/// `c1*(th1d + lam1*th1) + c2*(th2d' + lam2*th2') + k_c*(xd + lambda_c*x)`.
#[derive(Debug, Clone)]
pub struct HybridAdaptiveStaSmc {
    cfg: HybridConfig,
    surface: SlidingSurface,
    eq: EquivalentControl,
    model: FullDip,
    dir0: f64,
    dir: f64,
    k1: f64,
    k2: f64,
    u_int: f64,
    /// Internal clock, advanced by `dt` per call; used for the reset-rate
    /// bound.
    t: f64,
    last_reset: Option<f64>,
    violations: usize,
    sat: SaturationTracker,
    prev_u: f64,
}

impl HybridAdaptiveStaSmc {
    pub const GAIN_COUNT: usize = 4;

    pub fn new(physics: PhysicsParams, cfg: HybridConfig, gains: &[f64]) -> Result<Self, CoreError> {
        cfg.validate()?;
        let invalid = |reason: String| CoreError::InvalidGains {
            kind: ControllerKind::HybridAdaptiveStaSmc.as_str().to_string(),
            reason,
        };
        if gains.len() != Self::GAIN_COUNT {
            return Err(invalid(format!(
                "expected {} gains, got {}",
                Self::GAIN_COUNT,
                gains.len()
            )));
        }
        let (c1, lam1, c2, lam2) = (gains[0], gains[1], gains[2], gains[3]);
        let surface = SlidingSurface::with_cart(
            c1 * lam1,
            c2 * lam2,
            c1,
            c2,
            CartTerms {
                lam_c: cfg.k_c * cfg.lambda_c,
                k_c: cfg.k_c,
            },
            cfg.relative_theta2,
        )
        .map_err(invalid)?;
        let model = FullDip::new(physics)?;
        let eq = EquivalentControl::default();
        let dir0 = channel_direction(&model, &eq, &surface)?;
        let (k1, k2) = (cfg.k1_init, cfg.k2_init);
        let n_sat = cfg.n_sat;
        Ok(Self {
            cfg,
            surface,
            eq,
            model,
            dir0,
            dir: dir0,
            k1,
            k2,
            u_int: 0.0,
            t: 0.0,
            last_reset: None,
            violations: 0,
            sat: SaturationTracker::new(n_sat),
            prev_u: 0.0,
        })
    }

    pub fn gains(&self) -> (f64, f64) {
        (self.k1, self.k2)
    }

    fn adapt(&mut self, sigma: f64, dt: f64) {
        let in_dead_zone = sigma.abs() <= self.cfg.dead_zone;
        let drive1 = if in_dead_zone { 0.0 } else { self.cfg.gamma1 * sigma.abs() };
        let drive2 = if in_dead_zone { 0.0 } else { self.cfg.gamma2 * sigma.abs() };
        let k1dot = drive1 - self.cfg.leak * (self.k1 - self.cfg.k1_init);
        let k2dot = drive2 - self.cfg.leak * (self.k2 - self.cfg.k2_init);
        self.k1 = (self.k1 + k1dot * dt).clamp(self.cfg.k_min, self.cfg.k_max);
        self.k2 = (self.k2 + k2dot * dt).clamp(self.cfg.k_min, self.cfg.k_max);
    }

    fn reset_allowed(&self) -> bool {
        match self.last_reset {
            None => true,
            Some(t0) => self.t - t0 >= self.cfg.t_reset,
        }
    }

    fn fire_reset(&mut self) {
        // Shrink halfway toward the lower bound rather than jumping there,
        // so authority recovers quickly once the violation clears.
        self.k1 = self.cfg.k_min + 0.5 * (self.k1 - self.cfg.k_min);
        self.k2 = self.cfg.k_min + 0.5 * (self.k2 - self.cfg.k_min);
        self.u_int = 0.0;
        self.violations = 0;
        self.sat.clear();
        self.last_reset = Some(self.t);
    }
}

impl Controller for HybridAdaptiveStaSmc {
    fn compute_control(&mut self, x: &State, dt: f64) -> ControlOutput {
        self.t += dt;
        let sigma = self.surface.sigma(x);
        if !sigma.is_finite() {
            return ControlOutput::invalid(sigma);
        }

        // A failed model inversion is a violation event here, not an
        // immediate invalidation: the feedforward is skipped and the
        // emergency logic decides.
        let mut singular = false;
        let u_eq = if self.cfg.use_equivalent {
            match self.eq.solve(&self.model, &self.surface, x) {
                Some(sol) => {
                    if sol.beta.abs() >= self.eq.beta_min {
                        self.dir = sol.beta.signum();
                    }
                    sol.u_eq
                }
                None => {
                    singular = true;
                    0.0
                }
            }
        } else {
            0.0
        };

        self.adapt(sigma, dt);

        let phi = self.cfg.switching.phi(sigma, self.cfg.eps);
        let u_sta = -self.dir * self.k1 * sigma.abs().sqrt() * phi;
        self.u_int = (self.u_int - self.dir * self.k2 * phi * dt)
            .clamp(-self.cfg.u_int_max, self.cfg.u_int_max);
        let u_pd = self.cfg.kp_pd * x[0] + self.cfg.kd_pd * x[3];
        let u_raw = u_eq + u_sta + self.u_int - self.dir * self.cfg.k_d * sigma - u_pd;

        let mut u = u_raw.clamp(-self.cfg.u_max, self.cfg.u_max);
        let saturated = self.sat.observe(u_raw, self.cfg.u_max);

        let mode = if singular || saturated {
            self.violations += 1;
            if self.violations >= self.cfg.n_hyst && self.reset_allowed() {
                self.fire_reset();
                u = 0.0;
                ControllerMode::ResetFired
            } else {
                ControllerMode::ResetPending
            }
        } else {
            self.violations = 0;
            ControllerMode::Normal
        };

        let du = if dt > 0.0 { (u - self.prev_u) / dt } else { 0.0 };
        self.prev_u = u;

        ControlOutput {
            u,
            sigma,
            du,
            mode,
            valid: true,
            adaptive_gains: smallvec![self.k1, self.k2],
        }
    }

    fn reset(&mut self) {
        self.k1 = self.cfg.k1_init;
        self.k2 = self.cfg.k2_init;
        self.u_int = 0.0;
        self.t = 0.0;
        self.last_reset = None;
        self.violations = 0;
        self.sat.clear();
        self.dir = self.dir0;
        self.prev_u = 0.0;
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::HybridAdaptiveStaSmc
    }
}
