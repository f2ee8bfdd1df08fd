//! Exact Lagrangian model: centre-of-mass offsets, link inertias and all
//! velocity-product Coriolis terms.

use nalgebra::{Matrix3, Vector3};

use super::{couplings, DipModel, State};
use crate::config::PhysicsParams;
use crate::error::CoreError;
use crate::numeric::AdaptiveInverter;

#[derive(Debug, Clone)]
pub struct FullDip {
    params: PhysicsParams,
    inverter: AdaptiveInverter,
    // Configuration-independent inertia entries.
    m_total: f64,
    j1: f64,
    j2: f64,
}

impl FullDip {
    pub fn new(params: PhysicsParams) -> Result<Self, CoreError> {
        params.validate()?;
        let inverter = AdaptiveInverter::new(params.kappa_max);
        let m_total = params.m0 + params.m1 + params.m2;
        let j1 = params.i1 + params.m1 * params.lc1 * params.lc1 + params.m2 * params.l1 * params.l1;
        let j2 = params.i2 + params.m2 * params.lc2 * params.lc2;
        Ok(Self {
            params,
            inverter,
            m_total,
            j1,
            j2,
        })
    }
}

impl DipModel for FullDip {
    fn params(&self) -> &PhysicsParams {
        &self.params
    }

    fn inverter(&self) -> &AdaptiveInverter {
        &self.inverter
    }

    fn matrices(&self, x: &State) -> (Matrix3<f64>, Matrix3<f64>, Vector3<f64>) {
        let p = &self.params;
        let (h1, h2, h3) = couplings(p);
        let (s1, c1) = x[1].sin_cos();
        let (s2, c2) = x[2].sin_cos();
        let (s12, c12) = (x[1] - x[2]).sin_cos();
        let (th1d, th2d) = (x[4], x[5]);

        let m = Matrix3::new(
            self.m_total,
            h1 * c1,
            h2 * c2,
            h1 * c1,
            self.j1,
            h3 * c12,
            h2 * c2,
            h3 * c12,
            self.j2,
        );

        let c = Matrix3::new(
            p.b0,
            -h1 * s1 * th1d,
            -h2 * s2 * th2d,
            0.0,
            p.b1,
            h3 * s12 * th2d,
            0.0,
            -h3 * s12 * th1d,
            p.b2,
        );

        let g = Vector3::new(0.0, -h1 * p.g * s1, -h2 * p.g * s2);
        (m, c, g)
    }
}
