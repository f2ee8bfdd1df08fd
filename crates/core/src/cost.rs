//! Weighted integral cost over a trajectory and robust aggregation across
//! perturbed physics draws.

use crate::batch::Trajectory;
use crate::config::CostWeights;

/// Cost of one trajectory.
///
/// Four normalized integral terms (tracking error over cart and both
/// angles, control effort, control rate, sliding energy) plus a stability
/// term proportional to how early the trajectory failed. Fully valid
/// trajectories carry no stability term. Always finite.
pub fn trajectory_cost(traj: &Trajectory, w: &CostWeights) -> f64 {
    let n = traj.steps();
    if n == 0 {
        return 0.0;
    }
    let dt = if traj.times.len() > 1 {
        traj.times[1] - traj.times[0]
    } else {
        return 0.0;
    };
    let valid_steps = traj.valid_steps();

    let mut err = 0.0;
    let mut effort = 0.0;
    let mut rate = 0.0;
    let mut sliding = 0.0;

    for k in 0..valid_steps {
        let x = &traj.states[k];
        err += (x[0] * x[0] + x[1] * x[1] + x[2] * x[2]) * dt;
        let u = traj.controls[k];
        effort += u * u * dt;
        let prev = if k == 0 { 0.0 } else { traj.controls[k - 1] };
        let du = (u - prev) / dt;
        rate += du * du * dt;
        let s = traj.sigma[k];
        sliding += s * s * dt;
    }

    let mut j = w.w_e * err / w.n_e
        + w.w_u * effort / w.n_u
        + w.w_du * rate / w.n_du
        + w.w_sigma * sliding / w.n_sigma;

    if let Some(t_fail) = traj.t_fail {
        let horizon = n as f64 * dt;
        let remaining = (horizon - t_fail as f64 * dt) / horizon;
        j += w.w_stab * remaining * w.p_inst;
    }

    if j.is_finite() {
        j
    } else {
        w.p_inst * (1.0 + w.w_stab)
    }
}

/// Robust aggregation across perturbed-physics draws:
/// `a * mean + b * max`. Weighting the worst draw shifts the optimum toward
/// worst-case-aware gains.
pub fn aggregate(costs: &[f64], a: f64, b: f64) -> f64 {
    if costs.is_empty() {
        return f64::INFINITY;
    }
    let mean = costs.iter().sum::<f64>() / costs.len() as f64;
    let max = costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    a * mean + b * max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::State;

    fn flat_trajectory(steps: usize, u: f64, sigma: f64, t_fail: Option<usize>) -> Trajectory {
        let dt = 0.01;
        Trajectory {
            times: (0..=steps).map(|k| k as f64 * dt).collect(),
            states: vec![State::zeros(); steps + 1],
            controls: vec![u; steps],
            sigma: vec![sigma; steps],
            valid: t_fail.is_none(),
            t_fail,
        }
    }

    #[test]
    fn quiescent_trajectory_costs_nothing() {
        let traj = flat_trajectory(100, 0.0, 0.0, None);
        assert_eq!(trajectory_cost(&traj, &CostWeights::default()), 0.0);
    }

    #[test]
    fn effort_term_matches_hand_integral() {
        let traj = flat_trajectory(100, 2.0, 0.0, None);
        let w = CostWeights {
            w_e: 0.0,
            w_u: 1.0,
            w_du: 0.0,
            w_sigma: 0.0,
            w_stab: 0.0,
            ..CostWeights::default()
        };
        // First step contributes a rate term too, but w_du = 0 here.
        // integral u^2 dt = 4.0 * 1.0 s = 4.0, normalized by n_u.
        let j = trajectory_cost(&traj, &w);
        assert!((j - 4.0 / w.n_u).abs() < 1e-12);
    }

    #[test]
    fn earlier_failure_costs_more() {
        let w = CostWeights::default();
        let early = trajectory_cost(&flat_trajectory(100, 0.0, 0.0, Some(10)), &w);
        let late = trajectory_cost(&flat_trajectory(100, 0.0, 0.0, Some(90)), &w);
        assert!(early > late);
        let full = trajectory_cost(&flat_trajectory(100, 0.0, 0.0, Some(0)), &w);
        assert!((full - w.w_stab * w.p_inst).abs() < 1e-9);
    }

    #[test]
    fn invalid_cost_is_finite() {
        let j = trajectory_cost(&flat_trajectory(100, 150.0, 10.0, Some(50)), &CostWeights::default());
        assert!(j.is_finite());
        assert!(j > 0.0);
    }

    #[test]
    fn aggregation_blends_mean_and_max() {
        let costs = [1.0, 2.0, 9.0];
        let j = aggregate(&costs, 0.7, 0.3);
        assert!((j - (0.7 * 4.0 + 0.3 * 9.0)).abs() < 1e-12);
        // Pure mean and pure max as degenerate cases.
        assert!((aggregate(&costs, 1.0, 0.0) - 4.0).abs() < 1e-12);
        assert!((aggregate(&costs, 0.0, 1.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn aggregation_of_nothing_is_infinite() {
        assert!(aggregate(&[], 0.7, 0.3).is_infinite());
    }
}
