//! Wall interaction forces derived from the segment geometry.
//!
//! Two analytic terms act on fluid particles near a wall segment:
//!
//! - contact-angle adhesion, applied to interface particles only, which moves
//!   the contact line toward wetting (cos theta > 0) or de-wetting;
//! - short-range repulsion, applied to every particle, which stops fluid from
//!   penetrating the wall.
//!
//! Both are evaluated per segment and summed, so a particle near a corner
//! feels every segment whose span covers it.

use rayon::prelude::*;

use crate::geometry::{WallGeometry, WallSegment};
use crate::params::{AdhesionParams, InterfaceParams, RepulsionParams};
use crate::particle::FluidParticles;

/// Adhesion acceleration from one segment on a particle at `(x, y)`.
///
/// ```text
/// |a| = alpha sigma |cos theta| (1 - d / (delta h)) / h     for 0 < d < delta h
/// ```
///
/// The direction follows the segment's hydrophilic rule and is reversed for
/// hydrophobic segments.
pub fn adhesion_acceleration(
    segment: &WallSegment,
    x: f64,
    y: f64,
    h: f64,
    sigma: f64,
    params: &AdhesionParams,
) -> [f64; 2] {
    let Some(d) = segment.distance(x, y) else {
        return [0.0, 0.0];
    };
    let band = params.delta * h;
    if d <= 0.0 || d >= band {
        return [0.0, 0.0];
    }
    let cos = segment.cos_theta();
    let magnitude = params.alpha * sigma * cos.abs() * (1.0 - d / band) / h;
    let signed = if cos > 0.0 { magnitude } else { -magnitude };
    let dir = segment.adhesion_direction(x, y);
    [signed * dir[0], signed * dir[1]]
}

/// Repulsion acceleration from one segment on a particle at `(x, y)`.
///
/// ```text
/// |a| = k (1 - d / r0)^n    for 0 < d < r0
/// |a| = 10 k                for d <= 0
/// ```
///
/// directed along the segment's wall normal.
pub fn repulsion_acceleration(segment: &WallSegment, x: f64, y: f64, h: f64, params: &RepulsionParams) -> [f64; 2] {
    let Some(d) = segment.distance(x, y) else {
        return [0.0, 0.0];
    };
    let r0 = params.cutoff_for(h);
    if d >= r0 {
        return [0.0, 0.0];
    }
    let magnitude = if d <= 0.0 {
        10.0 * params.stiffness
    } else {
        params.stiffness * (1.0 - d / r0).powf(params.exponent)
    };
    let n = segment.wall_normal();
    [magnitude * n[0], magnitude * n[1]]
}

/// Add contact-angle adhesion to every interface particle.
pub fn wall_adhesion(
    fluid: &mut FluidParticles,
    geometry: &WallGeometry,
    sigma: f64,
    adhesion: &AdhesionParams,
    interface: &InterfaceParams,
) {
    let f: &FluidParticles = fluid;
    let acc: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            if !interface.is_interface(f.scolor[i]) {
                return [0.0, 0.0];
            }
            geometry.segments().iter().fold([0.0, 0.0], |a, seg| {
                let da = adhesion_acceleration(seg, f.x[i], f.y[i], f.h[i], sigma, adhesion);
                [a[0] + da[0], a[1] + da[1]]
            })
        })
        .collect();
    for (i, [ax, ay]) in acc.into_iter().enumerate() {
        fluid.au[i] += ax;
        fluid.av[i] += ay;
    }
}

/// Add wall repulsion to every fluid particle.
pub fn wall_repulsion(fluid: &mut FluidParticles, geometry: &WallGeometry, params: &RepulsionParams) {
    let f: &FluidParticles = fluid;
    let acc: Vec<[f64; 2]> = (0..f.len())
        .into_par_iter()
        .map(|i| {
            geometry.segments().iter().fold([0.0, 0.0], |a, seg| {
                let da = repulsion_acceleration(seg, f.x[i], f.y[i], f.h[i], params);
                [a[0] + da[0], a[1] + da[1]]
            })
        })
        .collect();
    for (i, [ax, ay]) in acc.into_iter().enumerate() {
        fluid.au[i] += ax;
        fluid.av[i] += ay;
    }
}
