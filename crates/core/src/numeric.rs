//! Numerical stability kernel: adaptive Tikhonov regularization and safe
//! inversion of the 3x3 inertia matrix.
//!
//! A fixed regularizer either biases well-conditioned matrices or is too
//! weak for pathological ones. Here the ridge grows monotonically with the
//! measured condition number, which keeps the regularized inverse continuous
//! as the condition number crosses the soft threshold and bounds the output
//! condition number from above.

use nalgebra::Matrix3;

use crate::error::CoreError;

/// Default soft threshold: below this the matrix is inverted directly with
/// the minimal ridge.
pub const KAPPA_SOFT: f64 = 1e8;
/// Minimal ridge applied even to well-conditioned matrices.
pub const ALPHA_MIN: f64 = 1e-10;
/// Upper bound imposed on the condition number after regularization.
pub const COND_TARGET: f64 = 1e10;

/// Safe inverter for symmetric positive-definite inertia matrices.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveInverter {
    pub kappa_soft: f64,
    /// Hard limit; above it the plant is reported singular.
    pub kappa_max: f64,
    pub alpha_min: f64,
    pub cond_target: f64,
}

impl AdaptiveInverter {
    pub fn new(kappa_max: f64) -> Self {
        Self {
            kappa_soft: KAPPA_SOFT,
            kappa_max,
            alpha_min: ALPHA_MIN,
            cond_target: COND_TARGET,
        }
    }

    /// Condition number from the singular-value spread. Non-finite entries
    /// and numerically zero minimal singular values map to infinity.
    pub fn condition(&self, m: &Matrix3<f64>) -> f64 {
        if m.iter().any(|v| !v.is_finite()) {
            return f64::INFINITY;
        }
        let sv = m.svd(false, false).singular_values;
        let smax = sv.max();
        let smin = sv.min();
        if smin <= smax * f64::EPSILON || smin == 0.0 {
            f64::INFINITY
        } else {
            smax / smin
        }
    }

    /// Invert `m`, regularizing as `(m + alpha I)^-1` with `alpha` chosen
    /// from the measured condition number.
    ///
    /// Above `kappa_max` this reports [`CoreError::SingularPlant`]; callers
    /// translate that into trajectory invalidity, never retry.
    pub fn invert(&self, m: &Matrix3<f64>) -> Result<Matrix3<f64>, CoreError> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::SingularPlant {
                cond: f64::INFINITY,
                max: self.kappa_max,
            });
        }
        let svd = m.svd(false, false);
        let smax = svd.singular_values.max();
        let smin = svd.singular_values.min();
        let cond = if smin <= smax * f64::EPSILON || smin == 0.0 {
            f64::INFINITY
        } else {
            smax / smin
        };

        if cond > self.kappa_max {
            return Err(CoreError::SingularPlant {
                cond,
                max: self.kappa_max,
            });
        }

        if cond <= self.kappa_soft {
            let reg = m + Matrix3::identity() * self.alpha_min;
            return reg.try_inverse().ok_or(CoreError::SingularPlant {
                cond,
                max: self.kappa_max,
            });
        }

        // Ridge grows linearly with the condition number, then is raised
        // further if needed so that cond(m + alpha I) <= cond_target.
        let mut alpha = self.alpha_min * (cond / self.kappa_soft);
        let floor = (smax - self.cond_target * smin) / (self.cond_target - 1.0);
        if floor > alpha {
            alpha = floor;
        }
        let reg = m + Matrix3::identity() * alpha;
        reg.svd(true, true)
            .pseudo_inverse(0.0)
            .map_err(|_| CoreError::SingularPlant {
                cond,
                max: self.kappa_max,
            })
    }
}
