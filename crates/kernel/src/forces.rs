//! Fluid force assembly: pressure gradient, viscosity, surface tension,
//! artificial stress and the no-slip wall term.
//!
//! Each function adds its contribution to `au, av`; the caller zeroes the
//! accelerations once per evaluation. Wall adhesion and repulsion live in
//! [`crate::boundary`].

use rayon::prelude::*;

use crate::neighbor::NeighborGrid;
use crate::params::ArtificialStressParams;
use crate::particle::{FluidParticles, SolidParticles};
use crate::sph::SmoothingKernel;

/// Regularisation of the Morris viscous denominator, as a fraction of h^2.
const VISCOUS_ETA: f64 = 0.01;

#[inline]
fn separation(xi: f64, yi: f64, xj: f64, yj: f64) -> (f64, f64, f64) {
    let dx = xi - xj;
    let dy = yi - yj;
    (dx, dy, (dx * dx + dy * dy).sqrt())
}

/// Add per-particle contributions produced by a parallel map.
fn accumulate(fluid: &mut FluidParticles, contributions: Vec<[f64; 2]>) {
    for (i, [ax, ay]) in contributions.into_iter().enumerate() {
        fluid.au[i] += ax;
        fluid.av[i] += ay;
    }
}

/// Inter-particle averaged pressure gradient against fluid and solid
/// neighbors, plus gravity.
///
/// ```text
/// p~_ij = (rho_j p_i + rho_i p_j) / (rho_i + rho_j)
/// a_i   = -(1/m_i) sum_j (V_i^2 + V_j^2) p~_ij grad W_ij + g
/// ```
pub fn pressure_gradient(
    fluid: &mut FluidParticles,
    solid: &SolidParticles,
    fluid_grid: &NeighborGrid,
    solid_grid: &NeighborGrid,
    kernel: SmoothingKernel,
    gravity: [f64; 2],
) {
    let f: &FluidParticles = fluid;
    let acc: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let (pi, rhoi, mi) = (f.p[i], f.rho[i], f.mass[i]);
            let vi2 = (mi / rhoi).powi(2);
            let radius = kernel.support_radius(h);
            let mut ax = 0.0;
            let mut ay = 0.0;
            let mut pair = |xj: f64, yj: f64, pj: f64, rhoj: f64, mj: f64| {
                let (dx, dy, r) = separation(xi, yi, xj, yj);
                let (wx, wy) = kernel.gradient(dx, dy, r, h);
                let vj2 = (mj / rhoj).powi(2);
                let pij = (rhoj * pi + rhoi * pj) / (rhoi + rhoj);
                let tmp = -(vi2 + vj2) * pij / mi;
                ax += tmp * wx;
                ay += tmp * wy;
            };
            fluid_grid.for_each_neighbor(i, &f.x, &f.y, radius, |j| {
                pair(f.x[j], f.y[j], f.p[j], f.rho[j], f.mass[j]);
            });
            solid_grid.for_each_near_point(xi, yi, &solid.x, &solid.y, radius, |b| {
                pair(solid.x[b], solid.y[b], solid.p[b], solid.rho[b], solid.mass[b]);
            });
            [ax + gravity[0], ay + gravity[1]]
        })
        .collect();
    accumulate(fluid, acc);
}

/// Harmonic mean of two dynamic viscosities.
#[inline]
fn harmonic_mean(a: f64, b: f64) -> f64 {
    let s = a + b;
    if s > 0.0 {
        2.0 * a * b / s
    } else {
        0.0
    }
}

/// Morris laminar viscosity between fluid particles, with the pair viscosity
/// taken as the harmonic mean of eta = nu rho.
///
/// ```text
/// a_i += (1/m_i) sum_j (V_i^2 + V_j^2) eta_ij (x_ij . grad W_ij) / (r^2 + 0.01 h^2) (v_i - v_j)
/// ```
pub fn viscous(fluid: &mut FluidParticles, grid: &NeighborGrid, kernel: SmoothingKernel) {
    let f: &FluidParticles = fluid;
    let acc: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let mi = f.mass[i];
            let vi2 = (mi / f.rho[i]).powi(2);
            let etai = f.nu[i] * f.rho[i];
            let reg = VISCOUS_ETA * h * h;
            let mut ax = 0.0;
            let mut ay = 0.0;
            grid.for_each_neighbor(i, &f.x, &f.y, kernel.support_radius(h), |j| {
                let (dx, dy, r) = separation(xi, yi, f.x[j], f.y[j]);
                let (wx, wy) = kernel.gradient(dx, dy, r, h);
                let vj2 = (f.mass[j] / f.rho[j]).powi(2);
                let etaij = harmonic_mean(etai, f.nu[j] * f.rho[j]);
                let xdotdw = dx * wx + dy * wy;
                let tmp = (vi2 + vj2) * etaij * xdotdw / ((r * r + reg) * mi);
                ax += tmp * (f.u[i] - f.u[j]);
                ay += tmp * (f.v[i] - f.v[j]);
            });
            [ax, ay]
        })
        .collect();
    accumulate(fluid, acc);
}

/// No-slip wall condition: the Morris viscous term against the solid ghost
/// velocities, using the fluid particle's own kinematic viscosity on both
/// sides.
pub fn no_slip(
    fluid: &mut FluidParticles,
    solid: &SolidParticles,
    solid_grid: &NeighborGrid,
    kernel: SmoothingKernel,
) {
    if solid.is_empty() {
        return;
    }
    let f: &FluidParticles = fluid;
    let acc: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let mi = f.mass[i];
            let vi2 = (mi / f.rho[i]).powi(2);
            let nu = f.nu[i];
            let etai = nu * f.rho[i];
            let reg = VISCOUS_ETA * h * h;
            let mut ax = 0.0;
            let mut ay = 0.0;
            solid_grid.for_each_near_point(xi, yi, &solid.x, &solid.y, kernel.support_radius(h), |b| {
                let (dx, dy, r) = separation(xi, yi, solid.x[b], solid.y[b]);
                let (wx, wy) = kernel.gradient(dx, dy, r, h);
                let vb2 = (solid.mass[b] / solid.rho[b]).powi(2);
                let etaij = harmonic_mean(etai, nu * solid.rho[b]);
                let tmp = (vi2 + vb2) * etaij * (dx * wx + dy * wy) / ((r * r + reg) * mi);
                ax += tmp * (f.u[i] - solid.ug[b]);
                ay += tmp * (f.v[i] - solid.vg[b]);
            });
            [ax, ay]
        })
        .collect();
    accumulate(fluid, acc);
}

/// Continuum-surface-force tension.
///
/// ```text
/// a_i += -sigma kappa_i grad c_i / rho_i
/// ```
///
/// Only particles with a valid interface normal contribute. Since grad c
/// points into the ink and kappa < 0 on a convex drop, the force pulls the
/// interface inward.
pub fn surface_tension(fluid: &mut FluidParticles, sigma: f64) {
    for i in 0..fluid.len() {
        if !fluid.has_normal[i] {
            continue;
        }
        let s = -sigma * fluid.kappa[i] / fluid.rho[i];
        fluid.au[i] += s * fluid.cx[i];
        fluid.av[i] += s * fluid.cy[i];
    }
}

/// Monaghan artificial stress against tensile particle clustering.
///
/// ```text
/// R_i  = eps |p_i| / rho_i^2   if p_i < 0, else 0
/// f_ij = W(r_ij) / W(dx)
/// a_i += -sum_j m_j (R_i + R_j) f_ij^n grad W_ij
/// ```
pub fn artificial_stress(
    fluid: &mut FluidParticles,
    grid: &NeighborGrid,
    kernel: SmoothingKernel,
    dx: f64,
    params: &ArtificialStressParams,
) {
    let stress = |p: f64, rho: f64| {
        if p < 0.0 {
            params.epsilon * p.abs() / (rho * rho)
        } else {
            0.0
        }
    };
    let f: &FluidParticles = fluid;
    let acc: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let ri = stress(f.p[i], f.rho[i]);
            let w_dx = kernel.weight(dx, h);
            let mut ax = 0.0;
            let mut ay = 0.0;
            grid.for_each_neighbor(i, &f.x, &f.y, kernel.support_radius(h), |j| {
                let rij = ri + stress(f.p[j], f.rho[j]);
                if rij == 0.0 {
                    return;
                }
                let (dx, dy, r) = separation(xi, yi, f.x[j], f.y[j]);
                let fij = kernel.weight(r, h) / w_dx;
                let (wx, wy) = kernel.gradient(dx, dy, r, h);
                let tmp = -f.mass[j] * rij * fij.powi(params.exponent);
                ax += tmp * wx;
                ay += tmp * wy;
            });
            [ax, ay]
        })
        .collect();
    accumulate(fluid, acc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::INK;

    const DX: f64 = 1.0e-5;
    const RHO0: f64 = 3000.0;

    fn pair(separation: f64) -> (FluidParticles, NeighborGrid) {
        let mut f = FluidParticles::new();
        let m = RHO0 * DX * DX;
        f.push_particle(0.0, 0.0, m, RHO0, 1.3 * DX, 10.0, INK, 5.0e-4);
        f.push_particle(separation, 0.0, m, RHO0, 1.3 * DX, 10.0, INK, 5.0e-4);
        let mut g = NeighborGrid::new(4.0 * DX, [-8.0 * DX; 2], [8.0 * DX; 2]);
        g.update(&f.x, &f.y);
        (f, g)
    }

    fn empty_grid() -> NeighborGrid {
        let mut g = NeighborGrid::new(1.0, [0.0; 2], [1.0; 2]);
        g.update(&[], &[]);
        g
    }

    #[test]
    fn positive_pressure_repels_and_conserves_momentum() {
        let (mut f, g) = pair(DX);
        f.p = vec![1000.0, 1000.0];
        let kernel = SmoothingKernel::QuinticSpline;
        pressure_gradient(&mut f, &SolidParticles::new(), &g, &empty_grid(), kernel, [0.0, 0.0]);
        assert!(f.au[0] < 0.0, "left particle should be pushed left");
        assert!(f.au[1] > 0.0, "right particle should be pushed right");
        assert!((f.au[0] + f.au[1]).abs() < 1.0e-9 * f.au[1].abs());
    }

    #[test]
    fn gravity_is_added_once() {
        let (mut f, g) = pair(10.0 * DX);
        let kernel = SmoothingKernel::WendlandC2;
        pressure_gradient(&mut f, &SolidParticles::new(), &g, &empty_grid(), kernel, [0.0, -9.81]);
        assert_eq!(f.av, vec![-9.81, -9.81]);
        assert_eq!(f.au, vec![0.0, 0.0]);
    }

    #[test]
    fn viscosity_damps_relative_motion() {
        let (mut f, g) = pair(DX);
        f.u = vec![0.1, -0.1];
        viscous(&mut f, &g, SmoothingKernel::QuinticSpline);
        assert!(f.au[0] < 0.0);
        assert!(f.au[1] > 0.0);
        assert!((f.au[0] + f.au[1]).abs() < 1.0e-9 * f.au[1].abs());
    }

    #[test]
    fn artificial_stress_only_under_tension() {
        let kernel = SmoothingKernel::QuinticSpline;
        let params = ArtificialStressParams::default();
        let (mut f, g) = pair(0.8 * DX);
        f.p = vec![500.0, 500.0];
        artificial_stress(&mut f, &g, kernel, DX, &params);
        assert_eq!(f.au, vec![0.0, 0.0]);

        f.p = vec![-500.0, -500.0];
        artificial_stress(&mut f, &g, kernel, DX, &params);
        // Tension term pushes close pairs apart
        assert!(f.au[0] < 0.0);
        assert!(f.au[1] > 0.0);
    }

    #[test]
    fn surface_tension_requires_valid_normal() {
        let (mut f, _) = pair(DX);
        f.kappa = vec![-1.0e4, -1.0e4];
        f.cx = vec![1.0e4, 1.0e4];
        f.has_normal = vec![true, false];
        surface_tension(&mut f, 0.04);
        // kappa < 0 and grad c along +x: force along +x
        assert!(f.au[0] > 0.0);
        assert_eq!(f.au[1], 0.0);
    }

    #[test]
    fn no_slip_drags_toward_wall_velocity() {
        let (mut f, _) = pair(10.0 * DX);
        f.u = vec![0.1, 0.0];
        let mut s = SolidParticles::new();
        s.push(0.0, -DX, RHO0 * DX * DX, RHO0, 0);
        s.ug[0] = -0.1;
        let mut sg = NeighborGrid::new(4.0 * DX, [-8.0 * DX; 2], [8.0 * DX; 2]);
        sg.update(&s.x, &s.y);
        no_slip(&mut f, &s, &sg, SmoothingKernel::QuinticSpline);
        assert!(f.au[0] < 0.0);
        assert_eq!(f.au[1], 0.0);
    }
}
