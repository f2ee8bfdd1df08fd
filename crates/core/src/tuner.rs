//! Glue between the swarm and the simulation stack: evaluates candidate
//! gain vectors by simulating them against perturbed physics draws and
//! aggregating the robust cost.

use rand_chacha::ChaCha8Rng;

use crate::batch::simulate_batch;
use crate::config::{CostWeights, PsoConfig, SimConfig};
use crate::cost::{aggregate, trajectory_cost};
use crate::error::CoreError;
use crate::factory::{ControllerKind, Gains, Registry};
use crate::plant::FullDip;
use crate::pso::{Evaluator, PsoEngine, PsoResult};
use crate::smc::Controller;

/// Robust fitness evaluator for one controller kind.
///
/// For each candidate: pre-screen the gains with the factory validator
/// (rejected candidates get a flat penalty without simulating), then
/// simulate one trajectory per perturbed physics draw and aggregate
/// `a * mean + b * max` over the draws.
pub struct TuningEvaluator {
    registry: Registry,
    kind: ControllerKind,
    sim: SimConfig,
    weights: CostWeights,
    /// Relative perturbation magnitude; zero disables perturbation.
    perturbation: f64,
    draws: usize,
    aggregation: (f64, f64),
}

impl TuningEvaluator {
    pub fn new(
        registry: Registry,
        kind: ControllerKind,
        sim: SimConfig,
        weights: CostWeights,
        pso: &PsoConfig,
    ) -> Result<Self, CoreError> {
        sim.validate()?;
        weights.validate()?;
        // Fail early on unknown kinds.
        registry.gain_spec(kind)?;
        Ok(Self {
            registry,
            kind,
            sim,
            weights,
            perturbation: pso.perturbation,
            draws: pso.draws,
            aggregation: pso.aggregation,
        })
    }

    fn rejected_cost(&self) -> f64 {
        self.weights.p_inst * (1.0 + self.weights.w_stab)
    }
}

impl Evaluator for TuningEvaluator {
    fn evaluate(&mut self, positions: &[Gains], rng: &mut ChaCha8Rng) -> Vec<f64> {
        let screened: Vec<bool> = positions
            .iter()
            .map(|g| self.registry.validate_gains(self.kind, g))
            .collect();

        let mut per_draw: Vec<Vec<f64>> = vec![Vec::with_capacity(self.draws); positions.len()];

        for _ in 0..self.draws {
            // One physics draw shared by every candidate of this round; the
            // draw order is fixed, so the whole evaluation is a pure
            // function of the substream.
            let physics = if self.perturbation > 0.0 && self.draws > 1 {
                self.registry.physics().perturbed(self.perturbation, rng)
            } else {
                self.registry.physics().clone()
            };
            let Ok(model) = FullDip::new(physics) else {
                // A pathological draw counts as a failed run for everyone.
                for costs in per_draw.iter_mut() {
                    costs.push(self.rejected_cost());
                }
                continue;
            };

            let mut jobs: Vec<(Box<dyn Controller>, crate::plant::State)> = Vec::new();
            let mut job_index: Vec<usize> = Vec::new();
            for (i, gains) in positions.iter().enumerate() {
                if !screened[i] {
                    continue;
                }
                match self.registry.create(self.kind, gains) {
                    Ok(ctrl) => {
                        jobs.push((ctrl, self.sim.initial_state()));
                        job_index.push(i);
                    }
                    Err(_) => {
                        // Validated but construction still failed (e.g. a
                        // perturbation-independent config issue); penalized.
                    }
                }
            }

            let batch = simulate_batch(&model, jobs, &self.sim);
            let mut simulated: Vec<Option<f64>> = vec![None; positions.len()];
            for (run, &i) in batch.runs.iter().zip(&job_index) {
                simulated[i] = Some(trajectory_cost(run, &self.weights));
            }
            for (i, costs) in per_draw.iter_mut().enumerate() {
                costs.push(simulated[i].unwrap_or_else(|| self.rejected_cost()));
            }
        }

        let (a, b) = self.aggregation;
        per_draw
            .iter()
            .enumerate()
            .map(|(i, costs)| {
                if screened[i] {
                    aggregate(costs, a, b)
                } else {
                    self.rejected_cost()
                }
            })
            .collect()
    }
}

/// Convenience entry point: build the engine from the registry's bounds for
/// `kind`, wire the factory validator and run the swarm.
pub fn tune(
    registry: Registry,
    kind: ControllerKind,
    sim: SimConfig,
    weights: CostWeights,
    pso_cfg: PsoConfig,
) -> Result<PsoResult, CoreError> {
    let (lower, upper) = {
        let (lo, hi) = registry.gain_bounds(kind)?;
        (lo.to_vec(), hi.to_vec())
    };
    let physics = registry.physics().clone();
    let engine = PsoEngine::new(pso_cfg.clone(), lower, upper)?.with_validator({
        let screen = crate::factory::default_registry(physics.clone())?;
        Box::new(move |g: &[f64]| screen.validate_gains(kind, g))
    });
    let mut evaluator = TuningEvaluator::new(registry, kind, sim, weights, &pso_cfg)?;
    Ok(engine.run(&mut evaluator))
}
