//! Per-step field computation: density, pressure, colour, wall extrapolation
//! and interface geometry.
//!
//! Every function here is a data-parallel map over particles. Each particle
//! reads the previous stage's fields of its neighbors and writes only its own
//! slot, so results do not depend on thread scheduling.

use rayon::prelude::*;

use crate::eos;
use crate::geometry::WallGeometry;
use crate::neighbor::NeighborGrid;
use crate::params::{InterfaceParams, WallNormalCorrection};
use crate::particle::{FluidParticles, SolidParticles};
use crate::sph::SmoothingKernel;

/// Kernel-weight sums below this are treated as "no fluid nearby".
const WEIGHT_SUM_EPS: f64 = 1.0e-12;

#[inline]
fn separation(xi: f64, yi: f64, xj: f64, yj: f64) -> (f64, f64, f64) {
    let dx = xi - xj;
    let dy = yi - yj;
    (dx, dy, (dx * dx + dy * dy).sqrt())
}

/// Summation density over fluid and solid neighbors, self-contribution
/// included.
///
/// ```text
/// rho_i = sum_j m_j W(r_ij, h)
/// ```
pub fn summation_density(
    fluid: &mut FluidParticles,
    solid: &SolidParticles,
    fluid_grid: &NeighborGrid,
    solid_grid: &NeighborGrid,
    kernel: SmoothingKernel,
) {
    let f: &FluidParticles = fluid;
    let rho: Vec<f64> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let radius = kernel.support_radius(h);
            let mut rho = f.mass[i] * kernel.weight(0.0, h);
            fluid_grid.for_each_neighbor(i, &f.x, &f.y, radius, |j| {
                let (_, _, r) = separation(xi, yi, f.x[j], f.y[j]);
                rho += f.mass[j] * kernel.weight(r, h);
            });
            solid_grid.for_each_near_point(xi, yi, &solid.x, &solid.y, radius, |b| {
                let (_, _, r) = separation(xi, yi, solid.x[b], solid.y[b]);
                rho += solid.mass[b] * kernel.weight(r, h);
            });
            rho
        })
        .collect();
    fluid.rho = rho;
}

/// Apply the stiffened equation of state to every fluid particle.
pub fn state_equation(fluid: &mut FluidParticles, rho0: f64, p0: f64, exponent: f64) {
    fluid
        .p
        .par_iter_mut()
        .zip(fluid.rho.par_iter())
        .for_each(|(p, &rho)| *p = eos::stiffened_eos(rho, rho0, p0, exponent));
}

/// Kernel-smoothed colour field.
///
/// ```text
/// scolor_i = sum_j (m_j / rho_j) c_j W(r_ij, h)
/// ```
///
/// The sum is not Shepard-normalised, so it also drops near free surfaces and
/// walls, where the fluid support is truncated.
pub fn smoothed_color(fluid: &mut FluidParticles, grid: &NeighborGrid, kernel: SmoothingKernel) {
    let f: &FluidParticles = fluid;
    let scolor: Vec<f64> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, h) = (f.x[i], f.y[i], f.h[i]);
            let radius = kernel.support_radius(h);
            let mut c = f.mass[i] / f.rho[i] * f.color[i] * kernel.weight(0.0, h);
            grid.for_each_neighbor(i, &f.x, &f.y, radius, |j| {
                if f.color[j] == 0.0 {
                    return;
                }
                let (_, _, r) = separation(xi, yi, f.x[j], f.y[j]);
                c += f.mass[j] / f.rho[j] * f.color[j] * kernel.weight(r, h);
            });
            c
        })
        .collect();
    fluid.scolor = scolor;
}

/// Extrapolate pressure, density and ghost velocity onto the wall particles.
///
/// Follows Adami et al. (2012):
/// ```text
/// p_w   = sum_f (p_f + rho_f g . (r_w - r_f)) W_wf / sum_f W_wf
/// rho_w = rho0 (p_w / p0 + 1)^(1/b)
/// u_w   = -sum_f u_f W_wf / sum_f W_wf        (no-slip mirror, wall at rest)
/// ```
/// Wall particles with no fluid in range get zero pressure, rest density and
/// zero ghost velocity.
#[allow(clippy::too_many_arguments)]
pub fn wall_pressure_bc(
    solid: &mut SolidParticles,
    fluid: &FluidParticles,
    fluid_grid: &NeighborGrid,
    kernel: SmoothingKernel,
    h: f64,
    gravity: [f64; 2],
    rho0: f64,
    p0: f64,
    exponent: f64,
) {
    let radius = kernel.support_radius(h);
    let s: &SolidParticles = solid;
    let extrapolated: Vec<(f64, f64, f64, f64)> = (0..s.len())
        .into_par_iter()
        .map(|b| {
            let (bx, by) = (s.x[b], s.y[b]);
            let mut wsum = 0.0;
            let mut psum = 0.0;
            let mut usum = 0.0;
            let mut vsum = 0.0;
            fluid_grid.for_each_near_point(bx, by, &fluid.x, &fluid.y, radius, |f| {
                let (dx, dy, r) = separation(bx, by, fluid.x[f], fluid.y[f]);
                let w = kernel.weight(r, h);
                let g_dot_dr = gravity[0] * dx + gravity[1] * dy;
                psum += (fluid.p[f] + fluid.rho[f] * g_dot_dr) * w;
                usum += fluid.u[f] * w;
                vsum += fluid.v[f] * w;
                wsum += w;
            });
            if wsum > WEIGHT_SUM_EPS {
                let p = psum / wsum;
                let rho = eos::inverse_stiffened_eos(p, rho0, p0, exponent);
                (p, rho, -usum / wsum, -vsum / wsum)
            } else {
                (0.0, rho0, 0.0, 0.0)
            }
        })
        .collect();

    for (b, (p, rho, ug, vg)) in extrapolated.into_iter().enumerate() {
        solid.p[b] = p;
        solid.rho[b] = rho;
        solid.ug[b] = ug;
        solid.vg[b] = vg;
    }
}

/// Interface normals from the Morris colour gradient, evaluated with the
/// smoothing length scaled by `params.h_scale`.
///
/// ```text
/// grad c_i = sum_j V_j (c~_j - c~_i) grad W(r_ij, h')
/// ```
///
/// The normal is kept only where |grad c| exceeds `normal_threshold / h`;
/// elsewhere the normal and the validity flag are cleared. The colour
/// gradient itself is stored in `cx, cy` and its magnitude in `ddelta`.
pub fn interface_normals(
    fluid: &mut FluidParticles,
    grid: &NeighborGrid,
    kernel: SmoothingKernel,
    params: &InterfaceParams,
) {
    let f: &FluidParticles = fluid;
    let normals: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi) = (f.x[i], f.y[i]);
            let hs = params.h_scale * f.h[i];
            let radius = kernel.support_radius(hs);
            let ci = f.scolor[i];
            let mut gx = 0.0;
            let mut gy = 0.0;
            grid.for_each_neighbor(i, &f.x, &f.y, radius, |j| {
                let (dx, dy, r) = separation(xi, yi, f.x[j], f.y[j]);
                let (wx, wy) = kernel.gradient(dx, dy, r, hs);
                let vj = f.mass[j] / f.rho[j];
                let dc = f.scolor[j] - ci;
                gx += vj * dc * wx;
                gy += vj * dc * wy;
            });
            [gx, gy]
        })
        .collect();

    for (i, [gx, gy]) in normals.into_iter().enumerate() {
        let mag = (gx * gx + gy * gy).sqrt();
        let eps = params.normal_threshold / fluid.h[i];
        fluid.cx[i] = gx;
        fluid.cy[i] = gy;
        fluid.ddelta[i] = mag;
        if mag > eps {
            fluid.nx[i] = gx / mag;
            fluid.ny[i] = gy / mag;
            fluid.has_normal[i] = true;
        } else {
            fluid.nx[i] = 0.0;
            fluid.ny[i] = 0.0;
            fluid.has_normal[i] = false;
        }
    }
}

/// Rotate interface normals near a wall toward the contact-angle direction.
///
/// For an interface particle at distance `d < delta h` from its nearest wall
/// segment, with `w` the segment normal into the fluid and `t` the wall
/// tangent oriented along the particle's own normal:
///
/// ```text
/// n_wall = -w cos(theta) + t sin(theta)
/// n      = normalize((1 - b) n + b n_wall),   b = clamp(1 - d / (delta h), 0, 1)
/// ```
///
/// Normals point into the ink, so a fully wetting wall pulls them into the
/// wall. Particles without a valid normal or outside the band are untouched.
pub fn correct_wall_normals(
    fluid: &mut FluidParticles,
    geometry: &WallGeometry,
    interface: &InterfaceParams,
    correction: &WallNormalCorrection,
) {
    let f: &FluidParticles = fluid;
    let corrected: Vec<Option<[f64; 2]>> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            if !f.has_normal[i] || !interface.is_interface(f.scolor[i]) {
                return None;
            }
            let band = correction.delta * f.h[i];
            let (d, segment) = geometry.nearest(f.x[i], f.y[i])?;
            if d >= band {
                return None;
            }
            let [wx, wy] = segment.wall_normal();
            let (nx, ny) = (f.nx[i], f.ny[i]);
            let (mut tx, mut ty) = (wy, -wx);
            if nx * tx + ny * ty < 0.0 {
                tx = -tx;
                ty = -ty;
            }
            let theta = segment.contact_angle_deg.to_radians();
            let (sin, cos) = theta.sin_cos();
            let target = [-wx * cos + tx * sin, -wy * cos + ty * sin];
            let b = (1.0 - d / band).clamp(0.0, 1.0);
            let bx = (1.0 - b) * nx + b * target[0];
            let by = (1.0 - b) * ny + b * target[1];
            let mag = (bx * bx + by * by).sqrt();
            (mag > 0.0).then(|| [bx / mag, by / mag])
        })
        .collect();

    for (i, n) in corrected.into_iter().enumerate() {
        if let Some([nx, ny]) = n {
            fluid.nx[i] = nx;
            fluid.ny[i] = ny;
        }
    }
}

/// Interface curvature as the number-density-corrected divergence of the
/// unit normal, restricted to neighbors with a valid normal.
///
/// ```text
/// kappa_i = d * sum_j V_j (n_j - n_i) . grad W_ij / sum_j V_j (-x_ij . grad W_ij)
/// ```
///
/// Particles without a valid normal get zero curvature.
pub fn interface_curvature(
    fluid: &mut FluidParticles,
    grid: &NeighborGrid,
    kernel: SmoothingKernel,
    params: &InterfaceParams,
) {
    const DIM: f64 = 2.0;
    let f: &FluidParticles = fluid;
    let kappa: Vec<f64> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            if !f.has_normal[i] {
                return 0.0;
            }
            let (xi, yi) = (f.x[i], f.y[i]);
            let hs = params.h_scale * f.h[i];
            let radius = kernel.support_radius(hs);
            let (nxi, nyi) = (f.nx[i], f.ny[i]);
            let mut num = 0.0;
            let mut den = 0.0;
            grid.for_each_neighbor(i, &f.x, &f.y, radius, |j| {
                if !f.has_normal[j] {
                    return;
                }
                let (dx, dy, r) = separation(xi, yi, f.x[j], f.y[j]);
                let (wx, wy) = kernel.gradient(dx, dy, r, hs);
                let vj = f.mass[j] / f.rho[j];
                num += vj * ((f.nx[j] - nxi) * wx + (f.ny[j] - nyi) * wy);
                den += vj * (-(dx * wx + dy * wy));
            });
            if den > WEIGHT_SUM_EPS {
                DIM * num / den
            } else {
                0.0
            }
        })
        .collect();
    fluid.kappa = kappa;
}
