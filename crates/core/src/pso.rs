//! Particle swarm optimizer with deterministic seeding.
//!
//! The engine knows nothing about controllers or physics: fitness comes
//! from an injected [`Evaluator`], which receives a dedicated substream of
//! the engine's generator each iteration. Two runs with the same seed and
//! configuration produce identical histories, bit for bit.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{PsoConfig, VelocityInit};
use crate::error::CoreError;
use crate::factory::Gains;
use crate::rng::{get_rng, substream};

/// Stream tag for per-iteration evaluator substreams.
const EVAL_STREAM: u64 = 0x4556_414c;

/// Maps a batch of candidate gain vectors to their costs.
///
/// Non-finite costs mark invalid candidates; they are counted in the
/// iteration statistics and never become personal or global bests. All
/// randomness used by the evaluator (physics perturbations in particular)
/// must come from the provided substream.
pub trait Evaluator {
    fn evaluate(&mut self, positions: &[Gains], rng: &mut ChaCha8Rng) -> Vec<f64>;
}

impl<F> Evaluator for F
where
    F: FnMut(&[Gains], &mut ChaCha8Rng) -> Vec<f64>,
{
    fn evaluate(&mut self, positions: &[Gains], rng: &mut ChaCha8Rng) -> Vec<f64> {
        self(positions, rng)
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    MaxIter,
    Converged,
    Stagnated,
    Stopped,
    NoValidCandidate,
}

/// Swarm statistics recorded once per iteration (iteration 0 is the
/// initial evaluation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStats {
    pub iter: usize,
    /// Global best cost after this iteration.
    pub best_cost: f64,
    /// Mean over the finite costs of this iteration.
    pub mean_cost: f64,
    /// Standard deviation over the finite costs of this iteration.
    pub std_cost: f64,
    /// Number of non-finite candidate costs this iteration.
    pub invalid: usize,
}

/// Best solution found by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmBest {
    pub gains: Gains,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct PsoResult {
    /// `None` only when no particle ever produced a finite cost.
    pub best: Option<SwarmBest>,
    pub history: Vec<IterationStats>,
    pub termination: Termination,
    pub seed: u64,
}

struct Particle {
    pos: Gains,
    vel: Gains,
    best_pos: Gains,
    best_cost: f64,
}

/// The swarm engine. Owns its generator exclusively; configuration is
/// immutable after construction.
pub struct PsoEngine {
    cfg: PsoConfig,
    lower: Vec<f64>,
    upper: Vec<f64>,
    validator: Option<Box<dyn Fn(&[f64]) -> bool + Send + Sync>>,
}

impl PsoEngine {
    pub fn new(cfg: PsoConfig, lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, CoreError> {
        cfg.validate()?;
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(CoreError::config("bounds", "lower/upper must be non-empty and equal length"));
        }
        for (lo, hi) in lower.iter().zip(&upper) {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(CoreError::config("bounds", "each dimension needs lo < hi, finite"));
            }
        }
        Ok(Self {
            cfg,
            lower,
            upper,
            validator: None,
        })
    }

    /// Install a cheap candidate pre-screen (typically the factory's gain
    /// validator). Particles failing it at initialization are resampled.
    pub fn with_validator(
        mut self,
        validator: Box<dyn Fn(&[f64]) -> bool + Send + Sync>,
    ) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    fn v_max(&self) -> Vec<f64> {
        let eta = self.cfg.eta.unwrap_or(0.5);
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| eta * (hi - lo))
            .collect()
    }

    fn sample_position(&self, rng: &mut ChaCha8Rng) -> Gains {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| rng.random_range(*lo..=*hi))
            .collect()
    }

    fn midpoint(&self) -> Gains {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }

    fn init_particle(&self, rng: &mut ChaCha8Rng, v_max: &[f64]) -> Particle {
        let mut pos = self.sample_position(rng);
        if let Some(validator) = &self.validator {
            let mut tries = 0;
            while !validator(&pos) && tries < self.cfg.k_reject {
                pos = self.sample_position(rng);
                tries += 1;
            }
            if !validator(&pos) {
                pos = self.midpoint();
            }
        }
        let vel: Gains = match self.cfg.velocity_init {
            VelocityInit::Zero => self.lower.iter().map(|_| 0.0).collect(),
            VelocityInit::Uniform => v_max
                .iter()
                .map(|vm| rng.random_range(-*vm..=*vm))
                .collect(),
        };
        Particle {
            best_pos: pos.clone(),
            pos,
            vel,
            best_cost: f64::INFINITY,
        }
    }

    pub fn run(&self, evaluator: &mut dyn Evaluator) -> PsoResult {
        self.run_with_stop(evaluator, || false)
    }

    /// Run the swarm; `should_stop` is polled between iterations for
    /// cooperative shutdown, returning the best-so-far result.
    #[tracing::instrument(skip(self, evaluator, should_stop), fields(seed = self.cfg.seed))]
    pub fn run_with_stop(
        &self,
        evaluator: &mut dyn Evaluator,
        should_stop: impl Fn() -> bool,
    ) -> PsoResult {
        let cfg = &self.cfg;
        let mut rng = get_rng(cfg.seed);
        let v_max = self.v_max();

        let mut particles: Vec<Particle> = (0..cfg.swarm_size)
            .map(|_| self.init_particle(&mut rng, &v_max))
            .collect();

        let mut history: Vec<IterationStats> = Vec::with_capacity(cfg.max_iter + 1);
        let mut g_best: Option<SwarmBest> = None;
        let mut gbest_trace: Vec<f64> = Vec::with_capacity(cfg.max_iter + 1);
        let mut stagnant = 0usize;
        let mut conv_run = 0usize;
        let mut termination = Termination::MaxIter;

        // Initial evaluation, recorded as iteration 0.
        let positions: Vec<Gains> = particles.iter().map(|p| p.pos.clone()).collect();
        let mut eval_rng = substream(cfg.seed, EVAL_STREAM);
        let costs = evaluator.evaluate(&positions, &mut eval_rng);
        debug_assert_eq!(costs.len(), particles.len());
        Self::absorb_costs(&mut particles, &costs, &mut g_best);
        history.push(Self::stats(0, &costs, &g_best));
        gbest_trace.push(g_best.as_ref().map_or(f64::INFINITY, |b| b.cost));

        for iter in 1..=cfg.max_iter {
            if should_stop() {
                termination = Termination::Stopped;
                break;
            }

            let social_anchor = g_best.as_ref().map(|b| b.gains.clone());
            for p in particles.iter_mut() {
                for d in 0..self.lower.len() {
                    let r1: f64 = rng.random_range(0.0..1.0);
                    let r2: f64 = rng.random_range(0.0..1.0);
                    let cognitive = cfg.c1 * r1 * (p.best_pos[d] - p.pos[d]);
                    let social = match &social_anchor {
                        Some(g) => cfg.c2 * r2 * (g[d] - p.pos[d]),
                        None => 0.0,
                    };
                    let mut v = cfg.w * p.vel[d] + cognitive + social;
                    if cfg.eta.is_some() {
                        v = v.clamp(-v_max[d], v_max[d]);
                    }
                    p.vel[d] = v;
                    p.pos[d] = (p.pos[d] + v).clamp(self.lower[d], self.upper[d]);
                }
            }

            let positions: Vec<Gains> = particles.iter().map(|p| p.pos.clone()).collect();
            let mut eval_rng = substream(cfg.seed, EVAL_STREAM.wrapping_add(iter as u64));
            let costs = evaluator.evaluate(&positions, &mut eval_rng);
            debug_assert_eq!(costs.len(), particles.len());

            let improved = Self::absorb_costs(&mut particles, &costs, &mut g_best);
            history.push(Self::stats(iter, &costs, &g_best));
            let current = g_best.as_ref().map_or(f64::INFINITY, |b| b.cost);
            gbest_trace.push(current);

            tracing::debug!(
                iter,
                best = current,
                invalid = history.last().map(|h| h.invalid).unwrap_or(0),
                "pso iteration"
            );

            if improved {
                stagnant = 0;
            } else {
                stagnant += 1;
                if stagnant >= cfg.k_stag {
                    termination = Termination::Stagnated;
                    break;
                }
            }

            let window = cfg.k_conv;
            if gbest_trace.len() > window {
                let then = gbest_trace[gbest_trace.len() - 1 - window];
                if then.is_finite() && (then - current).abs() < cfg.eps_conv {
                    conv_run += 1;
                    if conv_run >= window {
                        termination = Termination::Converged;
                        break;
                    }
                } else {
                    conv_run = 0;
                }
            }
        }

        if g_best.is_none() {
            termination = Termination::NoValidCandidate;
        }
        PsoResult {
            best: g_best,
            history,
            termination,
            seed: cfg.seed,
        }
    }

    /// Update personal and global bests on strict improvement; returns
    /// whether the global best improved.
    fn absorb_costs(
        particles: &mut [Particle],
        costs: &[f64],
        g_best: &mut Option<SwarmBest>,
    ) -> bool {
        let mut improved = false;
        for (p, &cost) in particles.iter_mut().zip(costs) {
            if !cost.is_finite() {
                continue;
            }
            if cost < p.best_cost {
                p.best_cost = cost;
                p.best_pos = p.pos.clone();
            }
            let beats_global = g_best.as_ref().map_or(true, |b| p.best_cost < b.cost);
            if beats_global {
                *g_best = Some(SwarmBest {
                    gains: p.best_pos.clone(),
                    cost: p.best_cost,
                });
                improved = true;
            }
        }
        improved
    }

    fn stats(iter: usize, costs: &[f64], g_best: &Option<SwarmBest>) -> IterationStats {
        let finite: Vec<f64> = costs.iter().copied().filter(|c| c.is_finite()).collect();
        let invalid = costs.len() - finite.len();
        let (mean, std) = if finite.is_empty() {
            (f64::INFINITY, f64::INFINITY)
        } else {
            let mean = finite.iter().sum::<f64>() / finite.len() as f64;
            let var = finite.iter().map(|c| (c - mean) * (c - mean)).sum::<f64>()
                / finite.len() as f64;
            (mean, var.sqrt())
        };
        IterationStats {
            iter,
            best_cost: g_best.as_ref().map_or(f64::INFINITY, |b| b.cost),
            mean_cost: mean,
            std_cost: std,
            invalid,
        }
    }
}
