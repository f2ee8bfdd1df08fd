//! Typed configuration for the plant, the simulator, the cost function and
//! the optimizer.
//!
//! Everything here is plain serde data. Validation is explicit: callers run
//! `validate()` once at construction time and the rest of the crate treats
//! the values as trusted and immutable.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::plant::State;
use crate::smc::switching::SwitchingMethod;

/// Rigid-body parameters of the double inverted pendulum on a cart.
///
/// Angles are measured from the upward vertical. `lc*` are centre-of-mass
/// offsets along each link, `i*` are link inertias about the centre of mass,
/// `b*` are viscous friction coefficients (cart, joint 1, joint 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsParams {
    pub m0: f64,
    pub m1: f64,
    pub m2: f64,
    pub l1: f64,
    pub l2: f64,
    pub lc1: f64,
    pub lc2: f64,
    pub i1: f64,
    pub i2: f64,
    #[serde(default = "default_gravity")]
    pub g: f64,
    #[serde(default)]
    pub b0: f64,
    #[serde(default)]
    pub b1: f64,
    #[serde(default)]
    pub b2: f64,
    /// Condition-number limit above which the inertia matrix is treated as
    /// singular.
    #[serde(default = "default_kappa_max")]
    pub kappa_max: f64,
}

fn default_gravity() -> f64 {
    9.81
}

fn default_kappa_max() -> f64 {
    1e14
}

impl PhysicsParams {
    /// Nominal bench parameters: 1.5 kg cart, 0.2 / 0.15 kg pendula,
    /// 0.4 / 0.3 m links with mid-link centres of mass.
    pub fn nominal() -> Self {
        Self {
            m0: 1.5,
            m1: 0.2,
            m2: 0.15,
            l1: 0.4,
            l2: 0.3,
            lc1: 0.2,
            lc2: 0.15,
            i1: 0.2 * 0.4 * 0.4 / 12.0,
            i2: 0.15 * 0.3 * 0.3 / 12.0,
            g: 9.81,
            b0: 0.1,
            b1: 0.01,
            b2: 0.01,
            kappa_max: default_kappa_max(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let positive = [
            ("m0", self.m0),
            ("m1", self.m1),
            ("m2", self.m2),
            ("l1", self.l1),
            ("l2", self.l2),
            ("lc1", self.lc1),
            ("lc2", self.lc2),
            ("i1", self.i1),
            ("i2", self.i2),
            ("g", self.g),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(CoreError::config(name, format!("must be > 0, got {v}")));
            }
        }
        let nonneg = [("b0", self.b0), ("b1", self.b1), ("b2", self.b2)];
        for (name, v) in nonneg {
            if !(v.is_finite() && v >= 0.0) {
                return Err(CoreError::config(name, format!("must be >= 0, got {v}")));
            }
        }
        if self.lc1 > self.l1 {
            return Err(CoreError::config("lc1", "centre of mass lies beyond the link"));
        }
        if self.lc2 > self.l2 {
            return Err(CoreError::config("lc2", "centre of mass lies beyond the link"));
        }
        if !(self.kappa_max.is_finite() && self.kappa_max >= 1.0) {
            return Err(CoreError::config("kappa_max", "must be >= 1"));
        }
        Ok(())
    }

    /// Draw a perturbed parameter set: every physical parameter is scaled by
    /// an independent uniform factor in `[1 - rel, 1 + rel]`. The condition
    /// limit `kappa_max` is left untouched.
    pub fn perturbed(&self, rel: f64, rng: &mut ChaCha8Rng) -> Self {
        let mut factor = |v: f64| v * rng.random_range(1.0 - rel..=1.0 + rel);
        Self {
            m0: factor(self.m0),
            m1: factor(self.m1),
            m2: factor(self.m2),
            l1: factor(self.l1),
            l2: factor(self.l2),
            lc1: factor(self.lc1),
            lc2: factor(self.lc2),
            i1: factor(self.i1),
            i2: factor(self.i2),
            g: factor(self.g),
            b0: factor(self.b0),
            b1: factor(self.b1),
            b2: factor(self.b2),
            kappa_max: self.kappa_max,
        }
    }
}

/// Fixed-step simulation setup shared by every trajectory of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Integration step in seconds.
    pub dt: f64,
    /// Number of fixed steps per trajectory.
    pub steps: usize,
    /// Initial state, `[x, th1, th2, xdot, th1dot, th2dot]`.
    pub x0: [f64; 6],
    /// Actuator limit; controls are clipped to `[-u_max, u_max]`.
    pub u_max: f64,
    /// Optional wall-clock budget per trajectory, in seconds. A timed-out
    /// trajectory is marked invalid and picks up the stability penalty.
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl SimConfig {
    pub fn new(dt: f64, horizon_s: f64, x0: [f64; 6], u_max: f64) -> Self {
        Self {
            dt,
            steps: (horizon_s / dt).round() as usize,
            x0,
            u_max,
            timeout: None,
        }
    }

    pub fn initial_state(&self) -> State {
        State::from_column_slice(&self.x0)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(CoreError::config("dt", "must be > 0"));
        }
        if self.steps == 0 {
            return Err(CoreError::config("steps", "must be >= 1"));
        }
        if !(self.u_max.is_finite() && self.u_max > 0.0) {
            return Err(CoreError::config("u_max", "must be > 0"));
        }
        if self.x0.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::config("x0", "must be finite"));
        }
        if let Some(t) = self.timeout {
            if !(t.is_finite() && t > 0.0) {
                return Err(CoreError::config("timeout", "must be > 0 when set"));
            }
        }
        Ok(())
    }
}

/// How particle velocities are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VelocityInit {
    #[default]
    Zero,
    Uniform,
}

/// Particle swarm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsoConfig {
    pub swarm_size: usize,
    pub max_iter: usize,
    /// Inertia weight.
    #[serde(default = "default_inertia")]
    pub w: f64,
    /// Cognitive acceleration.
    #[serde(default = "default_accel")]
    pub c1: f64,
    /// Social acceleration.
    #[serde(default = "default_accel")]
    pub c2: f64,
    /// Velocity clamp factor: `v_max = eta * (hi - lo)` per dimension.
    /// `None` disables clamping.
    #[serde(default = "default_eta")]
    pub eta: Option<f64>,
    #[serde(default)]
    pub velocity_init: VelocityInit,
    /// Convergence window length.
    #[serde(default = "default_k_conv")]
    pub k_conv: usize,
    /// Convergence tolerance on the global best over the window.
    #[serde(default = "default_eps_conv")]
    pub eps_conv: f64,
    /// Iterations without global-best improvement before stagnation fires.
    #[serde(default = "default_k_stag")]
    pub k_stag: usize,
    /// Resample attempts for particles failing the gain validator at init.
    #[serde(default = "default_k_reject")]
    pub k_reject: usize,
    pub seed: u64,
    /// Relative physics perturbation magnitude for robust evaluation.
    #[serde(default = "default_perturbation")]
    pub perturbation: f64,
    /// Number of perturbed physics draws per candidate.
    #[serde(default = "default_draws")]
    pub draws: usize,
    /// Robust aggregation weights `(mean, max)`.
    #[serde(default = "default_aggregation")]
    pub aggregation: (f64, f64),
}

fn default_inertia() -> f64 {
    0.7
}

fn default_accel() -> f64 {
    2.0
}

fn default_eta() -> Option<f64> {
    Some(0.5)
}

fn default_k_conv() -> usize {
    5
}

fn default_eps_conv() -> f64 {
    1e-9
}

fn default_k_stag() -> usize {
    15
}

fn default_k_reject() -> usize {
    10
}

fn default_perturbation() -> f64 {
    0.05
}

fn default_draws() -> usize {
    1
}

fn default_aggregation() -> (f64, f64) {
    (0.7, 0.3)
}

impl PsoConfig {
    pub fn new(swarm_size: usize, max_iter: usize, seed: u64) -> Self {
        Self {
            swarm_size,
            max_iter,
            w: default_inertia(),
            c1: default_accel(),
            c2: default_accel(),
            eta: default_eta(),
            velocity_init: VelocityInit::Zero,
            k_conv: default_k_conv(),
            eps_conv: default_eps_conv(),
            k_stag: default_k_stag(),
            k_reject: default_k_reject(),
            seed,
            perturbation: default_perturbation(),
            draws: default_draws(),
            aggregation: default_aggregation(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.swarm_size == 0 {
            return Err(CoreError::config("swarm_size", "must be >= 1"));
        }
        if self.max_iter == 0 {
            return Err(CoreError::config("max_iter", "must be >= 1"));
        }
        for (name, v) in [("w", self.w), ("c1", self.c1), ("c2", self.c2)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(CoreError::config(name, "must be finite and >= 0"));
            }
        }
        if let Some(eta) = self.eta {
            if !(eta.is_finite() && eta > 0.0) {
                return Err(CoreError::config("eta", "must be > 0 when set"));
            }
        }
        if !(0.0..1.0).contains(&self.perturbation) {
            return Err(CoreError::config("perturbation", "must be in [0, 1)"));
        }
        if self.draws == 0 {
            return Err(CoreError::config("draws", "must be >= 1"));
        }
        let (a, b) = self.aggregation;
        if !(a.is_finite() && b.is_finite() && a >= 0.0 && b >= 0.0 && a + b > 0.0) {
            return Err(CoreError::config(
                "aggregation",
                "weights must be >= 0 and not both 0",
            ));
        }
        if self.k_conv == 0 || self.k_stag == 0 {
            return Err(CoreError::config("k_conv/k_stag", "windows must be >= 1"));
        }
        Ok(())
    }
}

/// Weights and fixed normalization constants of the trajectory cost.
///
/// The normalization constants are per-problem constants, not statistics of
/// any dataset; the defaults below are the documented values recorded with
/// every tuning artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostWeights {
    pub w_e: f64,
    pub w_u: f64,
    pub w_du: f64,
    pub w_sigma: f64,
    pub w_stab: f64,
    /// Instability penalty scale.
    #[serde(default = "default_p_inst")]
    pub p_inst: f64,
    #[serde(default = "default_n_e")]
    pub n_e: f64,
    #[serde(default = "default_n_u")]
    pub n_u: f64,
    #[serde(default = "default_n_du")]
    pub n_du: f64,
    #[serde(default = "default_n_sigma")]
    pub n_sigma: f64,
}

fn default_p_inst() -> f64 {
    1000.0
}

fn default_n_e() -> f64 {
    1.0
}

fn default_n_u() -> f64 {
    1.0e4
}

fn default_n_du() -> f64 {
    1.0e6
}

fn default_n_sigma() -> f64 {
    1.0
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            w_e: 1.0,
            w_u: 0.1,
            w_du: 0.01,
            w_sigma: 0.1,
            w_stab: 1.0,
            p_inst: default_p_inst(),
            n_e: default_n_e(),
            n_u: default_n_u(),
            n_du: default_n_du(),
            n_sigma: default_n_sigma(),
        }
    }
}

impl CostWeights {
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("w_e", self.w_e),
            ("w_u", self.w_u),
            ("w_du", self.w_du),
            ("w_sigma", self.w_sigma),
            ("w_stab", self.w_stab),
            ("p_inst", self.p_inst),
        ];
        for (name, v) in fields {
            if !(v.is_finite() && v >= 0.0) {
                return Err(CoreError::config(name, "must be finite and >= 0"));
            }
        }
        let norms = [
            ("n_e", self.n_e),
            ("n_u", self.n_u),
            ("n_du", self.n_du),
            ("n_sigma", self.n_sigma),
        ];
        for (name, v) in norms {
            if !(v.is_finite() && v > 0.0) {
                return Err(CoreError::config(name, "must be > 0"));
            }
        }
        Ok(())
    }
}

/// Classical sliding-mode controller knobs (gains come from the factory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassicalConfig {
    #[serde(default = "default_boundary_layer")]
    pub eps: f64,
    #[serde(default)]
    pub switching: SwitchingMethod,
    #[serde(default = "default_u_max")]
    pub u_max: f64,
    /// Steps of continuous saturation before the mode reports `Saturated`.
    #[serde(default = "default_n_sat")]
    pub n_sat: usize,
}

fn default_boundary_layer() -> f64 {
    0.02
}

fn default_u_max() -> f64 {
    150.0
}

fn default_n_sat() -> usize {
    50
}

impl Default for ClassicalConfig {
    fn default() -> Self {
        Self {
            eps: default_boundary_layer(),
            switching: SwitchingMethod::default(),
            u_max: default_u_max(),
            n_sat: default_n_sat(),
        }
    }
}

impl ClassicalConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_common("classical", self.eps, self.u_max)
    }
}

/// Super-twisting controller knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaConfig {
    #[serde(default = "default_sta_eps")]
    pub eps: f64,
    #[serde(default)]
    pub switching: SwitchingMethod,
    #[serde(default = "default_u_max")]
    pub u_max: f64,
    /// Clamp for the integrator state `z`.
    #[serde(default = "default_z_max")]
    pub z_max: f64,
    /// Declared disturbance bound used by the algorithmic-gain validator.
    #[serde(default = "default_d_bound")]
    pub d_bound: f64,
    /// Nominal controllability scale the gain conditions are checked
    /// against.
    #[serde(default = "default_beta_scale")]
    pub beta_scale: f64,
    #[serde(default = "default_n_sat")]
    pub n_sat: usize,
}

fn default_sta_eps() -> f64 {
    0.05
}

fn default_z_max() -> f64 {
    100.0
}

fn default_d_bound() -> f64 {
    2.0
}

fn default_beta_scale() -> f64 {
    10.0
}

impl Default for StaConfig {
    fn default() -> Self {
        Self {
            eps: default_sta_eps(),
            switching: SwitchingMethod::default(),
            u_max: default_u_max(),
            z_max: default_z_max(),
            d_bound: default_d_bound(),
            beta_scale: default_beta_scale(),
            n_sat: default_n_sat(),
        }
    }
}

impl StaConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_common("sta", self.eps, self.u_max)?;
        if !(self.z_max.is_finite() && self.z_max > 0.0) {
            return Err(CoreError::config("z_max", "must be > 0"));
        }
        if !(self.d_bound.is_finite() && self.d_bound > 0.0) {
            return Err(CoreError::config("d_bound", "must be > 0"));
        }
        if !(self.beta_scale.is_finite() && self.beta_scale > 0.0) {
            return Err(CoreError::config("beta_scale", "must be > 0"));
        }
        Ok(())
    }
}

/// Adaptive sliding-mode controller knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(default = "default_boundary_layer")]
    pub eps: f64,
    #[serde(default)]
    pub switching: SwitchingMethod,
    #[serde(default = "default_u_max")]
    pub u_max: f64,
    /// Adaptation rate.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Dead-zone half width on |sigma|; inside it only the leak acts.
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f64,
    /// Leak rate pulling the gain back toward `k_init`.
    #[serde(default = "default_leak")]
    pub leak: f64,
    /// Rate limit on the gain derivative.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,
    #[serde(default = "default_k_init")]
    pub k_init: f64,
    #[serde(default = "default_k_min")]
    pub k_min: f64,
    #[serde(default = "default_k_max")]
    pub k_max: f64,
    #[serde(default = "default_n_sat")]
    pub n_sat: usize,
}

fn default_gamma() -> f64 {
    2.0
}

fn default_dead_zone() -> f64 {
    0.05
}

fn default_leak() -> f64 {
    0.1
}

fn default_rate_limit() -> f64 {
    100.0
}

fn default_k_init() -> f64 {
    0.5
}

fn default_k_min() -> f64 {
    0.1
}

fn default_k_max() -> f64 {
    20.0
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            eps: default_boundary_layer(),
            switching: SwitchingMethod::default(),
            u_max: default_u_max(),
            gamma: default_gamma(),
            dead_zone: default_dead_zone(),
            leak: default_leak(),
            rate_limit: default_rate_limit(),
            k_init: default_k_init(),
            k_min: default_k_min(),
            k_max: default_k_max(),
            n_sat: default_n_sat(),
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_common("adaptive", self.eps, self.u_max)?;
        for (name, v) in [
            ("gamma", self.gamma),
            ("dead_zone", self.dead_zone),
            ("rate_limit", self.rate_limit),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(CoreError::config(name, "must be > 0"));
            }
        }
        if !(self.leak.is_finite() && self.leak >= 0.0) {
            return Err(CoreError::config("leak", "must be >= 0"));
        }
        if !(self.k_min > 0.0 && self.k_min <= self.k_init && self.k_init <= self.k_max) {
            return Err(CoreError::config(
                "k_init",
                "bounds must satisfy 0 < k_min <= k_init <= k_max",
            ));
        }
        Ok(())
    }
}

/// Hybrid adaptive super-twisting controller knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "default_sta_eps")]
    pub eps: f64,
    #[serde(default)]
    pub switching: SwitchingMethod,
    #[serde(default = "default_u_max")]
    pub u_max: f64,
    /// Cart velocity weight in the sliding surface.
    #[serde(default = "default_cart_gain")]
    pub k_c: f64,
    /// Cart position weight per unit of `k_c`.
    #[serde(default = "default_cart_lambda")]
    pub lambda_c: f64,
    /// Measure the second pendulum relative to the first instead of
    /// absolutely.
    #[serde(default)]
    pub relative_theta2: bool,
    /// Model-based feedforward on by default.
    #[serde(default = "default_true")]
    pub use_equivalent: bool,
    /// Damping on the sliding variable.
    #[serde(default = "default_kd")]
    pub k_d: f64,
    /// Cart recentering PD pair.
    #[serde(default)]
    pub kp_pd: f64,
    #[serde(default)]
    pub kd_pd: f64,
    /// Adaptation of the two algorithmic gains.
    #[serde(default = "default_gamma")]
    pub gamma1: f64,
    #[serde(default = "default_gamma_2")]
    pub gamma2: f64,
    #[serde(default = "default_leak")]
    pub leak: f64,
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f64,
    #[serde(default = "default_hybrid_k_init")]
    pub k1_init: f64,
    #[serde(default = "default_hybrid_k_init")]
    pub k2_init: f64,
    #[serde(default = "default_hybrid_k_min")]
    pub k_min: f64,
    #[serde(default = "default_hybrid_k_max")]
    pub k_max: f64,
    /// Independent saturation for the integral term, decoupled from `u_max`
    /// so the actuator limit does not freeze adaptation.
    #[serde(default = "default_u_int_max")]
    pub u_int_max: f64,
    #[serde(default = "default_n_sat")]
    pub n_sat: usize,
    /// Consecutive violation steps required before an emergency reset.
    #[serde(default = "default_n_hyst")]
    pub n_hyst: usize,
    /// Minimum seconds between emergency resets.
    #[serde(default = "default_t_reset")]
    pub t_reset: f64,
}

fn default_cart_gain() -> f64 {
    0.5
}

fn default_cart_lambda() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_kd() -> f64 {
    1.0
}

fn default_gamma_2() -> f64 {
    0.5
}

fn default_hybrid_k_init() -> f64 {
    4.0
}

fn default_hybrid_k_min() -> f64 {
    0.1
}

fn default_hybrid_k_max() -> f64 {
    50.0
}

fn default_u_int_max() -> f64 {
    50.0
}

fn default_n_hyst() -> usize {
    10
}

fn default_t_reset() -> f64 {
    1.0
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            eps: default_sta_eps(),
            switching: SwitchingMethod::default(),
            u_max: default_u_max(),
            k_c: default_cart_gain(),
            lambda_c: default_cart_lambda(),
            relative_theta2: false,
            use_equivalent: true,
            k_d: default_kd(),
            kp_pd: 0.0,
            kd_pd: 0.0,
            gamma1: default_gamma(),
            gamma2: default_gamma_2(),
            leak: default_leak(),
            dead_zone: default_dead_zone(),
            k1_init: default_hybrid_k_init(),
            k2_init: default_hybrid_k_init(),
            k_min: default_hybrid_k_min(),
            k_max: default_hybrid_k_max(),
            u_int_max: default_u_int_max(),
            n_sat: default_n_sat(),
            n_hyst: default_n_hyst(),
            t_reset: default_t_reset(),
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_common("hybrid", self.eps, self.u_max)?;
        for (name, v) in [
            ("k_c", self.k_c),
            ("lambda_c", self.lambda_c),
            ("gamma1", self.gamma1),
            ("gamma2", self.gamma2),
            ("dead_zone", self.dead_zone),
            ("u_int_max", self.u_int_max),
            ("t_reset", self.t_reset),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(CoreError::config(name, "must be > 0"));
            }
        }
        for (name, v) in [
            ("k_d", self.k_d),
            ("kp_pd", self.kp_pd),
            ("kd_pd", self.kd_pd),
            ("leak", self.leak),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(CoreError::config(name, "must be >= 0"));
            }
        }
        if !(self.k_min > 0.0
            && self.k_min <= self.k1_init.min(self.k2_init)
            && self.k1_init.max(self.k2_init) <= self.k_max)
        {
            return Err(CoreError::config(
                "k1_init/k2_init",
                "bounds must satisfy 0 < k_min <= k_init <= k_max",
            ));
        }
        if self.n_hyst == 0 {
            return Err(CoreError::config("n_hyst", "must be >= 1"));
        }
        Ok(())
    }
}

fn validate_common(variant: &str, eps: f64, u_max: f64) -> Result<(), CoreError> {
    if !(eps.is_finite() && eps > 0.0) {
        return Err(CoreError::config(
            &format!("{variant}.eps"),
            "boundary layer must be strictly positive",
        ));
    }
    if !(u_max.is_finite() && u_max > 0.0) {
        return Err(CoreError::config(&format!("{variant}.u_max"), "must be > 0"));
    }
    Ok(())
}
