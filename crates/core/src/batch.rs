//! Fixed-step trajectory simulation, single and batched.
//!
//! The batch dimension is data-parallel: every trajectory owns its
//! controller state, results are order-invariant and bit-for-bit
//! deterministic for identical inputs. Step-local numerical failures are
//! encoded on the trajectory and never raised across the batch boundary.

use std::f64::consts::FRAC_PI_2;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::SimConfig;
use crate::plant::{DipModel, State};
use crate::smc::Controller;

/// One simulated trajectory on a fixed time grid.
///
/// `states` has `steps + 1` samples, `controls`/`sigma` have `steps`. When
/// `valid` is false the samples from `t_fail` onward repeat the last valid
/// state and carry zero control.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub controls: Vec<f64>,
    pub sigma: Vec<f64>,
    pub valid: bool,
    pub t_fail: Option<usize>,
}

impl Trajectory {
    pub fn steps(&self) -> usize {
        self.controls.len()
    }

    /// Index of the first invalid step, or the step count if fully valid.
    pub fn valid_steps(&self) -> usize {
        self.t_fail.unwrap_or_else(|| self.steps())
    }
}

/// A stack of independent trajectories sharing the time grid.
#[derive(Debug, Clone)]
pub struct BatchTrajectory {
    pub dt: f64,
    pub steps: usize,
    pub runs: Vec<Trajectory>,
}

impl BatchTrajectory {
    pub fn validity_mask(&self) -> Vec<bool> {
        self.runs.iter().map(|r| r.valid).collect()
    }

    pub fn invalid_count(&self) -> usize {
        self.runs.iter().filter(|r| !r.valid).count()
    }
}

fn state_ok(x: &State) -> bool {
    x.iter().all(|v| v.is_finite()) && x[1].abs() <= FRAC_PI_2 && x[2].abs() <= FRAC_PI_2
}

/// Simulate one trajectory from `x0` under the given controller.
///
/// Invalidation freezes the remaining samples at the last valid state; the
/// failure index is recorded so the cost can penalize early failures more.
pub fn simulate(
    model: &dyn DipModel,
    controller: &mut dyn Controller,
    x0: &State,
    cfg: &SimConfig,
) -> Trajectory {
    let n = cfg.steps;
    let dt = cfg.dt;
    let deadline = cfg.timeout.map(|s| (Instant::now(), s));

    let mut times = Vec::with_capacity(n + 1);
    let mut states = Vec::with_capacity(n + 1);
    let mut controls = vec![0.0; n];
    let mut sigma = vec![0.0; n];

    times.push(0.0);
    states.push(*x0);

    let mut x = *x0;
    let mut fail: Option<usize> = None;

    if !state_ok(&x) {
        fail = Some(0);
    }

    for k in 0..n {
        if fail.is_some() {
            break;
        }
        if let Some((start, budget)) = deadline {
            if start.elapsed().as_secs_f64() > budget {
                fail = Some(k);
                break;
            }
        }

        let out = controller.compute_control(&x, dt);
        if !out.valid || !out.u.is_finite() {
            fail = Some(k);
            break;
        }
        let u = out.u.clamp(-cfg.u_max, cfg.u_max);

        match model.step_rk4(&x, u, dt) {
            Ok(next) if state_ok(&next) => {
                controls[k] = u;
                sigma[k] = out.sigma;
                times.push((k + 1) as f64 * dt);
                states.push(next);
                x = next;
            }
            // Singular plant or non-finite/escaped state: step-local
            // failure, recorded and contained here.
            _ => {
                fail = Some(k);
                break;
            }
        }
    }

    // Freeze: pad the grid with the last valid state.
    let last = *states.last().expect("at least the initial state");
    while states.len() < n + 1 {
        let k = states.len();
        times.push(k as f64 * dt);
        states.push(last);
    }

    Trajectory {
        times,
        states,
        controls,
        sigma,
        valid: fail.is_none(),
        t_fail: fail,
    }
}

/// Simulate a batch of independent (controller, initial state) pairs.
///
/// Parallelism is across trajectories only; within a trajectory the steps
/// are strictly sequential. Never panics or raises across the batch
/// boundary for numerical failures.
pub fn simulate_batch(
    model: &dyn DipModel,
    jobs: Vec<(Box<dyn Controller>, State)>,
    cfg: &SimConfig,
) -> BatchTrajectory {
    let runs: Vec<Trajectory> = jobs
        .into_par_iter()
        .map(|(mut controller, x0)| simulate(model, controller.as_mut(), &x0, cfg))
        .collect();
    BatchTrajectory {
        dt: cfg.dt,
        steps: cfg.steps,
        runs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassicalConfig, PhysicsParams};
    use crate::plant::FullDip;
    use crate::smc::ClassicalSmc;

    fn classical() -> ClassicalSmc {
        ClassicalSmc::new(
            PhysicsParams::nominal(),
            ClassicalConfig::default(),
            &[10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
        )
        .unwrap()
    }

    fn sim_cfg(steps: usize) -> SimConfig {
        SimConfig {
            dt: 1e-3,
            steps,
            x0: [0.0, 0.05, -0.05, 0.0, 0.0, 0.0],
            u_max: 150.0,
            timeout: None,
        }
    }

    #[test]
    fn grid_shapes_are_consistent() {
        let model = FullDip::new(PhysicsParams::nominal()).unwrap();
        let cfg = sim_cfg(100);
        let mut c = classical();
        let traj = simulate(&model, &mut c, &cfg.initial_state(), &cfg);
        assert_eq!(traj.times.len(), 101);
        assert_eq!(traj.states.len(), 101);
        assert_eq!(traj.controls.len(), 100);
        assert_eq!(traj.sigma.len(), 100);
        assert!(traj.valid);
        assert_eq!(traj.t_fail, None);
    }

    #[test]
    fn initial_angle_violation_fails_at_step_zero() {
        let model = FullDip::new(PhysicsParams::nominal()).unwrap();
        let mut cfg = sim_cfg(50);
        cfg.x0[1] = 2.0; // beyond pi/2
        let mut c = classical();
        let traj = simulate(&model, &mut c, &cfg.initial_state(), &cfg);
        assert!(!traj.valid);
        assert_eq!(traj.t_fail, Some(0));
        // Frozen at the initial state.
        assert_eq!(traj.states[0], traj.states[50]);
        assert!(traj.controls.iter().all(|u| *u == 0.0));
    }

    #[test]
    fn singular_plant_is_contained_in_the_trajectory() {
        let mut physics = PhysicsParams::nominal();
        physics.kappa_max = 1.0; // every finite matrix is "singular"
        let model = FullDip::new(physics.clone()).unwrap();
        let cfg = sim_cfg(50);
        // The controller keeps the nominal (non-singular) model: the plant
        // itself rejects the step.
        let mut c = classical();
        let traj = simulate(&model, &mut c, &cfg.initial_state(), &cfg);
        assert!(!traj.valid);
        assert_eq!(traj.t_fail, Some(0));
    }

    #[test]
    fn batch_matches_independent_single_runs() {
        let model = FullDip::new(PhysicsParams::nominal()).unwrap();
        let cfg = sim_cfg(100);
        let x0 = cfg.initial_state();

        let batch = simulate_batch(
            &model,
            vec![
                (Box::new(classical()) as Box<dyn Controller>, x0),
                (Box::new(classical()) as Box<dyn Controller>, x0),
            ],
            &cfg,
        );

        let mut single = classical();
        let reference = simulate(&model, &mut single, &x0, &cfg);

        assert_eq!(batch.runs.len(), 2);
        for run in &batch.runs {
            assert_eq!(run.states, reference.states);
            assert_eq!(run.controls, reference.controls);
        }
        assert_eq!(batch.validity_mask(), vec![true, true]);
    }

    #[test]
    fn batch_is_deterministic_across_calls() {
        let model = FullDip::new(PhysicsParams::nominal()).unwrap();
        let cfg = sim_cfg(100);
        let x0 = cfg.initial_state();
        let run = |n: usize| {
            let jobs: Vec<(Box<dyn Controller>, State)> = (0..n)
                .map(|_| (Box::new(classical()) as Box<dyn Controller>, x0))
                .collect();
            simulate_batch(&model, jobs, &cfg)
        };
        let a = run(4);
        let b = run(4);
        for (ra, rb) in a.runs.iter().zip(&b.runs) {
            assert_eq!(ra.states, rb.states);
            assert_eq!(ra.controls, rb.controls);
        }
    }

    #[test]
    fn one_bad_trajectory_does_not_poison_the_batch() {
        let model = FullDip::new(PhysicsParams::nominal()).unwrap();
        let cfg = sim_cfg(100);
        let good = cfg.initial_state();
        let bad = State::new(0.0, 2.0, 0.0, 0.0, 0.0, 0.0);
        let batch = simulate_batch(
            &model,
            vec![
                (Box::new(classical()) as Box<dyn Controller>, bad),
                (Box::new(classical()) as Box<dyn Controller>, good),
            ],
            &cfg,
        );
        assert_eq!(batch.validity_mask(), vec![false, true]);
        assert_eq!(batch.invalid_count(), 1);
    }
}
