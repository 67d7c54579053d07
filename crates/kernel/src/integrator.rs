//! Time-step selection and the kinematic update helpers shared by both
//! integration schemes.

use serde::{Deserialize, Serialize};

use crate::particle::FluidParticles;

/// Safety factor applied to the tightest stability bound.
pub const TIMESTEP_SAFETY: f64 = 0.5;

/// Fluid velocity allowance folded into the acoustic bound.
const ACOUSTIC_MARGIN: f64 = 1.1;

/// Time integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorScheme {
    /// Midpoint predictor-corrector: two force evaluations per step.
    #[default]
    PredictorCorrector,
    /// Kick-drift-kick Velocity Verlet: one force evaluation per step.
    VelocityVerlet,
}

/// The three stability bounds and the resulting fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestepLimits {
    /// Acoustic CFL bound 0.25 h / (1.1 c0).
    pub acoustic: f64,
    /// Viscous bound 0.125 h^2 / nu.
    pub viscous: f64,
    /// Capillary bound sqrt(rho0 h^3 / (2 pi sigma)).
    pub capillary: f64,
    /// Chosen step: safety factor times the tightest bound.
    pub dt: f64,
}

impl TimestepLimits {
    /// Evaluate the bounds. `nu` is the effective kinematic viscosity; a zero
    /// viscosity or surface tension drops the corresponding bound.
    pub fn new(h: f64, c0: f64, nu: f64, rho0: f64, sigma: f64) -> Self {
        let acoustic = 0.25 * h / (ACOUSTIC_MARGIN * c0);
        let viscous = if nu > 0.0 {
            0.125 * h * h / nu
        } else {
            f64::INFINITY
        };
        let capillary = if sigma > 0.0 {
            (rho0 * h * h * h / (2.0 * std::f64::consts::PI * sigma)).sqrt()
        } else {
            f64::INFINITY
        };
        let dt = TIMESTEP_SAFETY * acoustic.min(viscous).min(capillary);
        Self {
            acoustic,
            viscous,
            capillary,
            dt,
        }
    }

    /// Name of the bound that sets the step.
    pub fn limiting(&self) -> &'static str {
        if self.acoustic <= self.viscous && self.acoustic <= self.capillary {
            "acoustic"
        } else if self.viscous <= self.capillary {
            "viscous"
        } else {
            "capillary"
        }
    }
}

/// Positions and velocities at the start of a step, kept so a failed step
/// can be rolled back.
#[derive(Debug, Clone, Default)]
pub struct Kinematics {
    x: Vec<f64>,
    y: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
}

impl Kinematics {
    /// Copy the current kinematic state of `fluid`.
    pub fn capture(fluid: &FluidParticles) -> Self {
        Self {
            x: fluid.x.clone(),
            y: fluid.y.clone(),
            u: fluid.u.clone(),
            v: fluid.v.clone(),
        }
    }

    /// Overwrite the kinematic state of `fluid` with the captured one.
    pub fn restore(&self, fluid: &mut FluidParticles) {
        fluid.x.clone_from(&self.x);
        fluid.y.clone_from(&self.y);
        fluid.u.clone_from(&self.u);
        fluid.v.clone_from(&self.v);
    }

    /// Predictor half step from the captured state:
    /// `u = u0 + dt/2 a`, `x = x0 + dt/2 u0`.
    pub fn predict(&self, fluid: &mut FluidParticles, dt: f64) {
        let half = 0.5 * dt;
        for i in 0..fluid.len() {
            fluid.u[i] = self.u[i] + half * fluid.au[i];
            fluid.v[i] = self.v[i] + half * fluid.av[i];
            fluid.x[i] = self.x[i] + half * self.u[i];
            fluid.y[i] = self.y[i] + half * self.v[i];
        }
    }

    /// Corrector full step from the captured state using the midpoint
    /// velocity currently in `fluid` and the midpoint acceleration:
    /// `x = x0 + dt u_half`, `u = u0 + dt a_half`.
    pub fn correct(&self, fluid: &mut FluidParticles, dt: f64) {
        for i in 0..fluid.len() {
            fluid.x[i] = self.x[i] + dt * fluid.u[i];
            fluid.y[i] = self.y[i] + dt * fluid.v[i];
            fluid.u[i] = self.u[i] + dt * fluid.au[i];
            fluid.v[i] = self.v[i] + dt * fluid.av[i];
        }
    }
}

/// Velocity update `v += a dt`.
pub fn kick(fluid: &mut FluidParticles, dt: f64) {
    for i in 0..fluid.len() {
        fluid.u[i] += fluid.au[i] * dt;
        fluid.v[i] += fluid.av[i] * dt;
    }
}

/// Position update `x += v dt`.
pub fn drift(fluid: &mut FluidParticles, dt: f64) {
    for i in 0..fluid.len() {
        fluid.x[i] += fluid.u[i] * dt;
        fluid.y[i] += fluid.v[i] * dt;
    }
}
