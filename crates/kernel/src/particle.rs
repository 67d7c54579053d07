//! Particle data structures using struct-of-arrays layout.
//!
//! Two populations exist: mobile fluid particles (ink and air, told apart by
//! their immutable `color`) and immobile solid particles that only enforce
//! wall boundary conditions.

use serde::{Deserialize, Serialize};

/// Colour value carried by ink particles.
pub const INK: f64 = 1.0;

/// Colour value carried by air particles.
pub const AIR: f64 = 0.0;

/// Colour threshold separating the ink phase from the air phase.
pub const PHASE_THRESHOLD: f64 = 0.5;

/// Struct-of-arrays fluid particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same
/// particle. Mass, colour and smoothing length are written once at creation;
/// everything else is recomputed or integrated each step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluidParticles {
    // ---- Kinematics ----
    /// X positions (m)
    pub x: Vec<f64>,
    /// Y positions (m)
    pub y: Vec<f64>,
    /// X velocities (m/s)
    pub u: Vec<f64>,
    /// Y velocities (m/s)
    pub v: Vec<f64>,
    /// X accelerations (m/s^2)
    pub au: Vec<f64>,
    /// Y accelerations (m/s^2)
    pub av: Vec<f64>,

    // ---- State ----
    /// Particle mass (kg per unit depth)
    pub mass: Vec<f64>,
    /// Density (kg/m^3)
    pub rho: Vec<f64>,
    /// Pressure (Pa)
    pub p: Vec<f64>,
    /// Smoothing length (m)
    pub h: Vec<f64>,
    /// Artificial speed of sound (m/s)
    pub cs: Vec<f64>,

    // ---- Phase and interface ----
    /// Phase colour: 1 for ink, 0 for air. Never changes after creation.
    pub color: Vec<f64>,
    /// Kernel-smoothed colour, recomputed every step.
    pub scolor: Vec<f64>,
    /// Colour gradient x component (unnormalised interface normal)
    pub cx: Vec<f64>,
    /// Colour gradient y component
    pub cy: Vec<f64>,
    /// Unit interface normal x component
    pub nx: Vec<f64>,
    /// Unit interface normal y component
    pub ny: Vec<f64>,
    /// Colour gradient magnitude (discrete interface delta)
    pub ddelta: Vec<f64>,
    /// Interface curvature (1/m)
    pub kappa: Vec<f64>,
    /// Whether the particle carries a reliable interface normal
    pub has_normal: Vec<bool>,

    // ---- Rheology ----
    /// Strain-rate magnitude (1/s)
    pub strain_rate: Vec<f64>,
    /// Local kinematic viscosity (m^2/s)
    pub nu: Vec<f64>,
}

impl FluidParticles {
    /// Create an empty particle collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of particles currently stored.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a particle at rest.
    ///
    /// Pressure, accelerations and all interface/rheology fields start at zero;
    /// `scolor` starts equal to `color`.
    #[allow(clippy::too_many_arguments)]
    pub fn push_particle(
        &mut self,
        x: f64,
        y: f64,
        mass: f64,
        rho: f64,
        h: f64,
        cs: f64,
        color: f64,
        nu: f64,
    ) {
        self.x.push(x);
        self.y.push(y);
        self.u.push(0.0);
        self.v.push(0.0);
        self.au.push(0.0);
        self.av.push(0.0);
        self.mass.push(mass);
        self.rho.push(rho);
        self.p.push(0.0);
        self.h.push(h);
        self.cs.push(cs);
        self.color.push(color);
        self.scolor.push(color);
        self.cx.push(0.0);
        self.cy.push(0.0);
        self.nx.push(0.0);
        self.ny.push(0.0);
        self.ddelta.push(0.0);
        self.kappa.push(0.0);
        self.has_normal.push(false);
        self.strain_rate.push(0.0);
        self.nu.push(nu);
    }

    /// Whether particle `i` belongs to the ink phase.
    #[inline]
    pub fn is_ink(&self, i: usize) -> bool {
        self.color[i] > PHASE_THRESHOLD
    }

    /// Number of ink particles.
    pub fn ink_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_ink(i)).count()
    }

    /// Total fluid mass, accumulated in index order.
    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    /// Mass-weighted centroid of the ink phase, or `None` without ink.
    pub fn ink_centroid(&self) -> Option<[f64; 2]> {
        let mut m = 0.0;
        let mut mx = 0.0;
        let mut my = 0.0;
        for i in (0..self.len()).filter(|&i| self.is_ink(i)) {
            m += self.mass[i];
            mx += self.mass[i] * self.x[i];
            my += self.mass[i] * self.y[i];
        }
        (m > 0.0).then(|| [mx / m, my / m])
    }
}

/// Struct-of-arrays solid (wall) particle storage.
///
/// Solid particles never move. Their pressure, density and ghost velocity are
/// extrapolated from the surrounding fluid every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolidParticles {
    /// X positions (m)
    pub x: Vec<f64>,
    /// Y positions (m)
    pub y: Vec<f64>,
    /// Particle mass (kg per unit depth)
    pub mass: Vec<f64>,
    /// Density (kg/m^3), from the inverse equation of state
    pub rho: Vec<f64>,
    /// Pressure (Pa), extrapolated from nearby fluid
    pub p: Vec<f64>,
    /// Ghost velocity x component used by the no-slip condition (m/s)
    pub ug: Vec<f64>,
    /// Ghost velocity y component (m/s)
    pub vg: Vec<f64>,
    /// Index of the wall segment this particle was generated for
    pub segment: Vec<usize>,
}

impl SolidParticles {
    /// Create an empty solid particle collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of solid particles.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no solid particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a wall particle with zero pressure and ghost velocity.
    pub fn push(&mut self, x: f64, y: f64, mass: f64, rho: f64, segment: usize) {
        self.x.push(x);
        self.y.push(y);
        self.mass.push(mass);
        self.rho.push(rho);
        self.p.push(0.0);
        self.ug.push(0.0);
        self.vg.push(0.0);
        self.segment.push(segment);
    }
}
