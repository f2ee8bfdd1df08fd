//! Continuous approximations of the sign function used inside the boundary
//! layer.

use serde::{Deserialize, Serialize};

/// Switching function `phi(sigma; eps)`.
///
/// `Sign` is the discontinuous original; it is accepted only when the caller
/// explicitly opts into chattering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SwitchingMethod {
    #[default]
    Tanh,
    Linear,
    Sign,
}

impl SwitchingMethod {
    /// Evaluate the switching function. `eps` is the boundary-layer width;
    /// it must be strictly positive (enforced at config validation).
    pub fn phi(self, sigma: f64, eps: f64) -> f64 {
        match self {
            SwitchingMethod::Tanh => (sigma / eps).tanh(),
            SwitchingMethod::Linear => (sigma / eps).clamp(-1.0, 1.0),
            SwitchingMethod::Sign => {
                if sigma == 0.0 {
                    0.0
                } else {
                    sigma.signum()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tanh_saturates_to_unit() {
        let phi = SwitchingMethod::Tanh.phi(10.0, 0.02);
        assert!((phi - 1.0).abs() < 1e-12);
        assert_eq!(SwitchingMethod::Tanh.phi(0.0, 0.02), 0.0);
    }

    #[test]
    fn linear_is_clipped() {
        assert_eq!(SwitchingMethod::Linear.phi(0.01, 0.02), 0.5);
        assert_eq!(SwitchingMethod::Linear.phi(1.0, 0.02), 1.0);
        assert_eq!(SwitchingMethod::Linear.phi(-1.0, 0.02), -1.0);
    }

    #[test]
    fn sign_is_odd_and_zero_at_zero() {
        assert_eq!(SwitchingMethod::Sign.phi(0.5, 0.02), 1.0);
        assert_eq!(SwitchingMethod::Sign.phi(-0.5, 0.02), -1.0);
        assert_eq!(SwitchingMethod::Sign.phi(0.0, 0.02), 0.0);
    }

    #[test]
    fn methods_agree_far_from_the_layer() {
        for sigma in [3.0, -3.0, 7.5] {
            let t = SwitchingMethod::Tanh.phi(sigma, 0.01);
            let l = SwitchingMethod::Linear.phi(sigma, 0.01);
            let s = SwitchingMethod::Sign.phi(sigma, 0.01);
            assert!((t - s).abs() < 1e-9);
            assert_eq!(l, s);
        }
    }
}
