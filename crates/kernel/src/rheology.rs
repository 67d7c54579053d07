//! Carreau shear-thinning rheology.
//!
//! When enabled, the strain-rate magnitude of every fluid particle is
//! estimated from the SPH velocity gradient and mapped to a local kinematic
//! viscosity before the viscous force is assembled.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::neighbor::NeighborGrid;
use crate::particle::FluidParticles;
use crate::sph::SmoothingKernel;

/// Carreau viscosity model.
///
/// ```text
/// eta(g) = eta_inf + (eta0 - eta_inf) * [1 + (lambda g)^2]^((n - 1) / 2)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarreauModel {
    /// Zero-shear dynamic viscosity (Pa s).
    pub eta0: f64,
    /// Infinite-shear dynamic viscosity (Pa s).
    pub eta_inf: f64,
    /// Relaxation time (s).
    pub lambda: f64,
    /// Power-law index; below 1 the fluid shear-thins.
    pub n: f64,
}

impl Default for CarreauModel {
    fn default() -> Self {
        Self {
            eta0: 0.5,
            eta_inf: 0.167,
            lambda: 0.15,
            n: 0.7,
        }
    }
}

impl CarreauModel {
    /// Dynamic viscosity at strain rate `gamma_dot` (1/s).
    pub fn viscosity(&self, gamma_dot: f64) -> f64 {
        if gamma_dot == 0.0 {
            return self.eta0;
        }
        let lg = self.lambda * gamma_dot;
        self.eta_inf + (self.eta0 - self.eta_inf) * (1.0 + lg * lg).powf(0.5 * (self.n - 1.0))
    }

    /// Kinematic viscosity at strain rate `gamma_dot` for reference density `rho0`.
    pub fn kinematic(&self, gamma_dot: f64, rho0: f64) -> f64 {
        self.viscosity(gamma_dot) / rho0
    }

    /// Check the parameter ranges, reporting the first violation.
    pub fn check(&self) -> Result<(), CarreauError> {
        if !(self.eta0 >= 0.0 && self.eta_inf >= 0.0) {
            return Err(CarreauError::NegativeViscosity {
                eta0: self.eta0,
                eta_inf: self.eta_inf,
            });
        }
        if self.eta_inf > self.eta0 {
            return Err(CarreauError::InvertedViscosities {
                eta0: self.eta0,
                eta_inf: self.eta_inf,
            });
        }
        if !(self.lambda >= 0.0) {
            return Err(CarreauError::NegativeRelaxationTime(self.lambda));
        }
        if !(self.n > 0.0) {
            return Err(CarreauError::NonPositiveIndex(self.n));
        }
        Ok(())
    }
}

/// Out-of-range Carreau parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CarreauError {
    /// A viscosity is negative or NaN.
    #[error("viscosities must be non-negative (eta0={eta0}, eta_inf={eta_inf})")]
    NegativeViscosity {
        /// Zero-shear viscosity.
        eta0: f64,
        /// Infinite-shear viscosity.
        eta_inf: f64,
    },
    /// The infinite-shear plateau lies above the zero-shear one.
    #[error("eta_inf ({eta_inf}) must not exceed eta0 ({eta0})")]
    InvertedViscosities {
        /// Zero-shear viscosity.
        eta0: f64,
        /// Infinite-shear viscosity.
        eta_inf: f64,
    },
    /// The relaxation time is negative or NaN.
    #[error("lambda must be non-negative, got {0}")]
    NegativeRelaxationTime(f64),
    /// The power-law index is zero, negative or NaN.
    #[error("power-law index must be positive, got {0}")]
    NonPositiveIndex(f64),
}

/// Estimate the strain-rate magnitude of every fluid particle.
///
/// The velocity gradient is assembled as
/// `sum_j V_j (v_j - v_i) (x) grad W_ij`, giving the symmetric rate tensor
/// components e_xx, e_yy, e_xy. The magnitude is
/// `sqrt(2 (e_xx^2 + e_yy^2 + 2 e_xy^2))`.
pub fn compute_strain_rate(fluid: &mut FluidParticles, grid: &NeighborGrid, kernel: SmoothingKernel) {
    let f: &FluidParticles = fluid;
    let rates: Vec<f64> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let (ui, vi) = (f.u[i], f.v[i]);
            let mut dudx = 0.0;
            let mut dudy = 0.0;
            let mut dvdx = 0.0;
            let mut dvdy = 0.0;
            grid.for_each_neighbor(i, &f.x, &f.y, kernel.support_radius(h), |j| {
                let dx = xi - f.x[j];
                let dy = yi - f.y[j];
                let r = (dx * dx + dy * dy).sqrt();
                let (wx, wy) = kernel.gradient(dx, dy, r, h);
                let vj = f.mass[j] / f.rho[j];
                let du = f.u[j] - ui;
                let dv = f.v[j] - vi;
                dudx += vj * du * wx;
                dudy += vj * du * wy;
                dvdx += vj * dv * wx;
                dvdy += vj * dv * wy;
            });
            // The magnitude is taken of the summed gradient, not summed per
            // pair: a rigid rotation must give zero shear and so zero thinning.
            let exy = 0.5 * (dudy + dvdx);
            let sum = 2.0 * (dudx * dudx + dvdy * dvdy + 2.0 * exy * exy);
            sum.max(0.0).sqrt()
        })
        .collect();
    fluid.strain_rate = rates;
}

/// Overwrite each particle's kinematic viscosity from its strain rate.
pub fn update_viscosity(fluid: &mut FluidParticles, model: &CarreauModel, rho0: f64) {
    fluid
        .nu
        .par_iter_mut()
        .zip(fluid.strain_rate.par_iter())
        .for_each(|(nu, &g)| *nu = model.kinematic(g, rho0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::INK;

    #[test]
    fn zero_shear_gives_eta0_exactly() {
        let m = CarreauModel::default();
        assert_eq!(m.viscosity(0.0), m.eta0);
    }

    #[test]
    fn shear_thinning_is_monotone_and_bounded() {
        let m = CarreauModel::default();
        let mut prev = m.viscosity(0.0);
        for k in 1..200 {
            let g = 10f64.powf(-2.0 + 0.05 * k as f64);
            let eta = m.viscosity(g);
            assert!(eta <= prev, "viscosity increased at gamma_dot={g}");
            assert!(eta >= m.eta_inf);
            prev = eta;
        }
        // Very high shear approaches eta_inf
        assert!((m.viscosity(1.0e12) - m.eta_inf) < 1.0e-3);
    }

    #[test]
    fn newtonian_index_is_constant() {
        let m = CarreauModel {
            n: 1.0,
            ..CarreauModel::default()
        };
        assert!((m.viscosity(1234.0) - m.eta0).abs() < 1.0e-15);
    }

    #[test]
    fn invalid_parameters_are_reported() {
        let inverted = CarreauModel {
            eta_inf: 1.0,
            ..CarreauModel::default()
        };
        assert_eq!(
            inverted.check(),
            Err(CarreauError::InvertedViscosities { eta0: 0.5, eta_inf: 1.0 })
        );
        let bad_n = CarreauModel {
            n: 0.0,
            ..CarreauModel::default()
        };
        assert_eq!(bad_n.check(), Err(CarreauError::NonPositiveIndex(0.0)));
        let negative = CarreauModel {
            lambda: -1.0,
            ..CarreauModel::default()
        };
        assert_eq!(negative.check(), Err(CarreauError::NegativeRelaxationTime(-1.0)));
        let nan = CarreauModel {
            eta0: f64::NAN,
            ..CarreauModel::default()
        };
        assert!(matches!(nan.check(), Err(CarreauError::NegativeViscosity { .. })));
        assert_eq!(CarreauModel::default().check(), Ok(()));
    }

    #[test]
    fn simple_shear_strain_rate() {
        // u = G y on a lattice; the interior magnitude should be close to G.
        let dx = 1.0e-5;
        let shear = 100.0;
        let kernel = SmoothingKernel::QuinticSpline;
        let mut f = FluidParticles::new();
        let n = 21;
        for j in 0..n {
            for i in 0..n {
                let x = (i as f64 + 0.5) * dx;
                let y = (j as f64 + 0.5) * dx;
                f.push_particle(x, y, 3000.0 * dx * dx, 3000.0, 1.3 * dx, 10.0, INK, 1.0e-4);
                let last = f.len() - 1;
                f.u[last] = shear * y;
            }
        }
        let mut grid = NeighborGrid::covering(kernel.support_radius(1.3 * dx), &[(&f.x, &f.y)], dx);
        grid.update(&f.x, &f.y);
        compute_strain_rate(&mut f, &grid, kernel);
        let centre = 10 * n + 10;
        let rel = (f.strain_rate[centre] - shear).abs() / shear;
        assert!(rel < 0.02, "strain rate {} vs {shear}", f.strain_rate[centre]);

        let m = CarreauModel::default();
        update_viscosity(&mut f, &m, 3000.0);
        assert!(f.nu[centre] < m.eta0 / 3000.0);
        assert!(f.nu[centre] > m.eta_inf / 3000.0);
    }

    #[test]
    fn rigid_rotation_has_no_strain_rate() {
        let dx = 1.0e-5;
        let omega = 500.0;
        let kernel = SmoothingKernel::QuinticSpline;
        let n = 21;
        let c = 0.5 * n as f64 * dx;
        let mut f = FluidParticles::new();
        for j in 0..n {
            for i in 0..n {
                let x = (i as f64 + 0.5) * dx;
                let y = (j as f64 + 0.5) * dx;
                f.push_particle(x, y, 3000.0 * dx * dx, 3000.0, 1.3 * dx, 10.0, INK, 1.0e-4);
                let last = f.len() - 1;
                f.u[last] = -omega * (y - c);
                f.v[last] = omega * (x - c);
            }
        }
        let mut grid = NeighborGrid::covering(kernel.support_radius(1.3 * dx), &[(&f.x, &f.y)], dx);
        grid.update(&f.x, &f.y);
        compute_strain_rate(&mut f, &grid, kernel);
        let centre = 10 * n + 10;
        assert!(
            f.strain_rate[centre] < 1.0e-6 * omega,
            "rotation produced strain rate {}",
            f.strain_rate[centre]
        );
        let m = CarreauModel::default();
        update_viscosity(&mut f, &m, 3000.0);
        assert!((f.nu[centre] - m.eta0 / 3000.0).abs() < 1.0e-9 * m.eta0 / 3000.0);
    }
}
