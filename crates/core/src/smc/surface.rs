//! Sliding-surface definition shared by every controller variant.

use nalgebra::Vector3;

use crate::plant::State;

/// Optional cart weighting: adds `lam_c * x + k_c * xdot` to the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartTerms {
    pub lam_c: f64,
    pub k_c: f64,
}

/// Scalar sliding variable
/// `sigma = lam1*th1 + lam2*th2' + k1*th1d + k2*th2d' (+ cart terms)`,
/// where `th2'` is either the absolute second angle or the angle relative to
/// the first link.
///
/// Positivity of `lam*` and `k*` is the attractiveness condition: on
/// `sigma = 0` the angle dynamics reduce to stable first-order decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingSurface {
    pub lam1: f64,
    pub lam2: f64,
    pub k1: f64,
    pub k2: f64,
    pub cart: Option<CartTerms>,
    pub relative_theta2: bool,
}

impl SlidingSurface {
    /// Pendulum-only surface (classical, STA, adaptive variants).
    pub fn new(lam1: f64, lam2: f64, k1: f64, k2: f64) -> Result<Self, String> {
        let s = Self {
            lam1,
            lam2,
            k1,
            k2,
            cart: None,
            relative_theta2: false,
        };
        s.check()?;
        Ok(s)
    }

    /// Surface with cart weighting (hybrid variant).
    pub fn with_cart(
        lam1: f64,
        lam2: f64,
        k1: f64,
        k2: f64,
        cart: CartTerms,
        relative_theta2: bool,
    ) -> Result<Self, String> {
        let s = Self {
            lam1,
            lam2,
            k1,
            k2,
            cart: Some(cart),
            relative_theta2,
        };
        s.check()?;
        Ok(s)
    }

    fn check(&self) -> Result<(), String> {
        let required = [
            ("lam1", self.lam1),
            ("lam2", self.lam2),
            ("k1", self.k1),
            ("k2", self.k2),
        ];
        for (name, v) in required {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("surface gain {name} must be > 0, got {v}"));
            }
        }
        if let Some(c) = &self.cart {
            if !(c.k_c.is_finite() && c.k_c > 0.0 && c.lam_c.is_finite() && c.lam_c >= 0.0) {
                return Err("cart surface terms must satisfy k_c > 0, lam_c >= 0".to_string());
            }
        }
        Ok(())
    }

    fn theta2(&self, x: &State) -> (f64, f64) {
        if self.relative_theta2 {
            (x[2] - x[1], x[5] - x[4])
        } else {
            (x[2], x[5])
        }
    }

    pub fn sigma(&self, x: &State) -> f64 {
        let (th2, th2d) = self.theta2(x);
        let mut s = self.lam1 * x[1] + self.lam2 * th2 + self.k1 * x[4] + self.k2 * th2d;
        if let Some(c) = &self.cart {
            s += c.lam_c * x[0] + c.k_c * x[3];
        }
        s
    }

    /// Row vector `L` multiplying the accelerations in `sigma_dot`, in
    /// `(xdd, th1dd, th2dd)` order.
    pub fn projection(&self) -> Vector3<f64> {
        let kc = self.cart.map_or(0.0, |c| c.k_c);
        if self.relative_theta2 {
            Vector3::new(kc, self.k1 - self.k2, self.k2)
        } else {
            Vector3::new(kc, self.k1, self.k2)
        }
    }

    /// The part of `sigma_dot` that does not involve accelerations.
    pub fn position_rate(&self, x: &State) -> f64 {
        let (_, th2d) = self.theta2(x);
        let mut r = self.lam1 * x[4] + self.lam2 * th2d;
        if let Some(c) = &self.cart {
            r += c.lam_c * x[3];
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_matches_hand_computation() {
        let s = SlidingSurface::new(15.0, 12.0, 10.0, 8.0).unwrap();
        let x = State::new(0.0, 0.1, -0.1, 0.0, 0.2, -0.3);
        let expect = 15.0 * 0.1 + 12.0 * (-0.1) + 10.0 * 0.2 + 8.0 * (-0.3);
        assert!((s.sigma(&x) - expect).abs() < 1e-12);
    }

    #[test]
    fn non_positive_gains_are_rejected() {
        assert!(SlidingSurface::new(0.0, 12.0, 10.0, 8.0).is_err());
        assert!(SlidingSurface::new(15.0, -1.0, 10.0, 8.0).is_err());
    }

    #[test]
    fn relative_formulation_shifts_theta2() {
        let s = SlidingSurface::with_cart(
            15.0,
            12.0,
            10.0,
            8.0,
            CartTerms { lam_c: 0.5, k_c: 0.5 },
            true,
        )
        .unwrap();
        let x = State::new(0.0, 0.1, 0.1, 0.0, 0.0, 0.0);
        // Relative theta2 is zero here, so only the theta1 terms remain.
        assert!((s.sigma(&x) - 15.0 * 0.1).abs() < 1e-12);
    }

    #[test]
    fn projection_accounts_for_relative_coupling() {
        let s = SlidingSurface::with_cart(
            15.0,
            12.0,
            10.0,
            8.0,
            CartTerms { lam_c: 0.5, k_c: 0.5 },
            true,
        )
        .unwrap();
        let l = s.projection();
        assert_eq!(l[0], 0.5);
        assert_eq!(l[1], 2.0);
        assert_eq!(l[2], 8.0);
    }
}
