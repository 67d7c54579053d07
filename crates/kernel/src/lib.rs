//! Two-phase SPH droplet kernel
//!
//! This crate provides the numerical core for simulating an ink droplet
//! spreading on a flat substrate or inside a rectangular micro-cavity, using
//! weakly-compressible SPH with colour-function interface tracking.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays fluid and solid particle storage.
//! - [`sph`] -- Wendland C2 and quintic spline kernels in 2D.
//! - [`neighbor`] -- Uniform-grid cell list for neighbor search.
//! - [`eos`] -- Stiffened equation of state and its inverse.
//! - [`geometry`] -- Wall segments, contact angles and boundary particle tiling.
//! - [`fields`] -- Density, pressure, colour, wall extrapolation, normals, curvature.
//! - [`rheology`] -- Carreau shear-thinning viscosity.
//! - [`forces`] -- Pressure, viscous, surface tension, artificial stress, no-slip.
//! - [`boundary`] -- Contact-angle adhesion and wall repulsion.
//! - [`integrator`] -- Stable time step and kinematic update helpers.
//! - [`params`] -- Physical and numerical parameters.

#![warn(missing_docs)]

pub mod boundary;
pub mod eos;
pub mod fields;
pub mod forces;
pub mod geometry;
pub mod integrator;
pub mod neighbor;
pub mod params;
pub mod particle;
pub mod rheology;
pub mod sph;

pub use geometry::{CavityAngles, CavityDims, GeometryError, SegmentKind, WallGeometry, WallSegment};
pub use integrator::{IntegratorScheme, TimestepLimits};
pub use neighbor::NeighborGrid;
pub use params::SphParams;
pub use particle::{FluidParticles, SolidParticles};
pub use rheology::{CarreauError, CarreauModel};
pub use sph::SmoothingKernel;

use integrator::Kinematics;
use thiserror::Error;

/// Errors raised while advancing the simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// A field became NaN or infinite. The step was rolled back.
    #[error(
        "numerical instability at step {step} (t = {time:.6e} s): non-finite {field} on fluid particle {particle}"
    )]
    NumericalInstability {
        /// Index of the step that failed (0-based).
        step: u64,
        /// Simulation time at the start of the failed step (s).
        time: f64,
        /// Name of the first non-finite field found.
        field: &'static str,
        /// Index of the offending particle.
        particle: usize,
    },
}

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Aggregate error / conservation metrics for a simulation snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    /// Maximum relative density deviation from rest density across fluid particles.
    pub max_density_variation: f64,
    /// Relative total mass drift from initial mass (|M - M0| / |M0|).
    pub mass_conservation: f64,
}

/// Trait implemented by simulation back-ends.
///
/// A `SimulationKernel` owns particle data and advances the simulation through
/// a fixed pipeline each force evaluation:
///
/// 1. Neighbor search
/// 2. Density, optional rheology, pressure, colour, wall extrapolation
/// 3. Interface normals and curvature
/// 4. Force assembly (fluid terms, then wall adhesion and repulsion)
/// 5. Time integration
pub trait SimulationKernel {
    /// Execute one simulation step of duration `dt` seconds.
    ///
    /// On error the particle kinematics are left as they were before the call.
    fn step(&mut self, dt: f64) -> Result<(), KernelError>;

    /// Current fluid particle state.
    fn fluid(&self) -> &FluidParticles;

    /// Current solid particle state.
    fn solid(&self) -> &SolidParticles;

    /// Simulated time (s).
    fn time(&self) -> f64;

    /// Number of completed steps.
    fn step_count(&self) -> u64;

    /// Get current error / conservation metrics.
    fn error_metrics(&self) -> ErrorMetrics;

    /// Number of fluid particles in the simulation.
    fn particle_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// CpuKernel -- reference CPU implementation of SimulationKernel
// ---------------------------------------------------------------------------

/// Reference CPU implementation of the droplet kernel.
///
/// Stages are data-parallel over particles (rayon) with a barrier between
/// each one. Integration is either midpoint predictor-corrector or
/// kick-drift-kick Velocity Verlet.
pub struct CpuKernel {
    /// Fluid (ink and air) particle data.
    fluid: FluidParticles,
    /// Wall particle data (static).
    solid: SolidParticles,
    /// Wall segments for adhesion and repulsion.
    geometry: WallGeometry,
    /// Physical and numerical parameters.
    params: SphParams,
    /// Cell list over fluid particles, rebuilt every evaluation.
    fluid_grid: NeighborGrid,
    /// Cell list over solid particles, built once.
    solid_grid: NeighborGrid,
    /// Completed steps.
    step_count: u64,
    /// Simulated time (s).
    time: f64,
    /// Initial total mass for conservation tracking.
    initial_mass: f64,
    /// Whether accelerations must be evaluated before the next Verlet kick.
    needs_init: bool,
}

impl CpuKernel {
    /// Create a new CPU kernel.
    ///
    /// The neighbor grids cover the initial particle extent padded by a
    /// generous margin; particles that leave it are clamped into border cells
    /// and remain correct. The cell size covers the widest search in the
    /// pipeline, including the interface normal and curvature stencils at
    /// `h_scale * h`.
    pub fn new(
        fluid: FluidParticles,
        solid: SolidParticles,
        geometry: WallGeometry,
        params: SphParams,
    ) -> Self {
        let h_max = fluid.h.iter().cloned().fold(params.h, f64::max);
        let reach = h_max * params.interface.h_scale.max(1.0);
        let cell_size = params.kernel.support_radius(reach);
        let margin = 10.0 * cell_size;
        let extent = [(&fluid.x[..], &fluid.y[..]), (&solid.x[..], &solid.y[..])];
        let fluid_grid = NeighborGrid::covering(cell_size, &extent, margin);
        let mut solid_grid = NeighborGrid::covering(cell_size, &extent, margin);
        solid_grid.update(&solid.x, &solid.y);

        let initial_mass = fluid.total_mass();

        tracing::debug!(
            fluid = fluid.len(),
            solid = solid.len(),
            cell_size,
            "CPU kernel initialised"
        );

        Self {
            fluid,
            solid,
            geometry,
            params,
            fluid_grid,
            solid_grid,
            step_count: 0,
            time: 0.0,
            initial_mass,
            needs_init: true,
        }
    }

    /// Wall geometry in use.
    pub fn geometry(&self) -> &WallGeometry {
        &self.geometry
    }

    /// Parameters in use.
    pub fn params(&self) -> &SphParams {
        &self.params
    }

    /// Run the full field and force pipeline at the current positions and
    /// velocities, leaving the accelerations in `au, av`.
    pub fn compute_accelerations(&mut self) {
        let kernel = self.params.kernel;
        let p0 = self.params.background_pressure();

        self.fluid_grid.update(&self.fluid.x, &self.fluid.y);

        fields::summation_density(
            &mut self.fluid,
            &self.solid,
            &self.fluid_grid,
            &self.solid_grid,
            kernel,
        );

        if let Some(model) = self.params.carreau {
            rheology::compute_strain_rate(&mut self.fluid, &self.fluid_grid, kernel);
            rheology::update_viscosity(&mut self.fluid, &model, self.params.rho0);
        }

        fields::state_equation(&mut self.fluid, self.params.rho0, p0, self.params.eos_exponent);
        fields::smoothed_color(&mut self.fluid, &self.fluid_grid, kernel);
        fields::wall_pressure_bc(
            &mut self.solid,
            &self.fluid,
            &self.fluid_grid,
            kernel,
            self.params.h,
            self.params.gravity,
            self.params.rho0,
            p0,
            self.params.eos_exponent,
        );
        fields::interface_normals(&mut self.fluid, &self.fluid_grid, kernel, &self.params.interface);
        if self.params.wall_normal_correction.enabled {
            fields::correct_wall_normals(
                &mut self.fluid,
                &self.geometry,
                &self.params.interface,
                &self.params.wall_normal_correction,
            );
        }
        fields::interface_curvature(&mut self.fluid, &self.fluid_grid, kernel, &self.params.interface);

        self.fluid.au.iter_mut().for_each(|a| *a = 0.0);
        self.fluid.av.iter_mut().for_each(|a| *a = 0.0);

        forces::pressure_gradient(
            &mut self.fluid,
            &self.solid,
            &self.fluid_grid,
            &self.solid_grid,
            kernel,
            self.params.gravity,
        );
        forces::viscous(&mut self.fluid, &self.fluid_grid, kernel);
        forces::surface_tension(&mut self.fluid, self.params.sigma);
        forces::artificial_stress(
            &mut self.fluid,
            &self.fluid_grid,
            kernel,
            self.params.dx,
            &self.params.artificial_stress,
        );
        forces::no_slip(&mut self.fluid, &self.solid, &self.solid_grid, kernel);
        boundary::wall_adhesion(
            &mut self.fluid,
            &self.geometry,
            self.params.sigma,
            &self.params.adhesion,
            &self.params.interface,
        );
        boundary::wall_repulsion(&mut self.fluid, &self.geometry, &self.params.repulsion);
    }

    /// First non-finite field among the integrated and derived fluid state.
    fn find_non_finite(&self) -> Option<(&'static str, usize)> {
        let f = &self.fluid;
        let fields: [(&'static str, &Vec<f64>); 6] = [
            ("x", &f.x),
            ("y", &f.y),
            ("u", &f.u),
            ("v", &f.v),
            ("rho", &f.rho),
            ("p", &f.p),
        ];
        fields.iter().find_map(|(name, values)| {
            values
                .iter()
                .position(|value| !value.is_finite())
                .map(|i| (*name, i))
        })
    }

    fn advance(&mut self, start: &Kinematics, dt: f64) {
        match self.params.scheme {
            IntegratorScheme::PredictorCorrector => {
                self.compute_accelerations();
                start.predict(&mut self.fluid, dt);
                self.compute_accelerations();
                start.correct(&mut self.fluid, dt);
            }
            IntegratorScheme::VelocityVerlet => {
                // Accelerations are only zero-valid before the first step or
                // after a rollback.
                if self.needs_init {
                    self.compute_accelerations();
                    self.needs_init = false;
                }
                integrator::kick(&mut self.fluid, 0.5 * dt);
                integrator::drift(&mut self.fluid, dt);
                self.compute_accelerations();
                integrator::kick(&mut self.fluid, 0.5 * dt);
            }
        }
    }
}

impl SimulationKernel for CpuKernel {
    fn step(&mut self, dt: f64) -> Result<(), KernelError> {
        let start = Kinematics::capture(&self.fluid);
        // Density and pressure are reported between steps, so they roll back too.
        let rho = self.fluid.rho.clone();
        let p = self.fluid.p.clone();
        self.advance(&start, dt);

        if let Some((field, particle)) = self.find_non_finite() {
            start.restore(&mut self.fluid);
            self.fluid.rho = rho;
            self.fluid.p = p;
            self.needs_init = true;
            tracing::error!(
                step = self.step_count,
                time = self.time,
                field,
                particle,
                "non-finite state, step rolled back"
            );
            return Err(KernelError::NumericalInstability {
                step: self.step_count,
                time: self.time,
                field,
                particle,
            });
        }

        self.step_count += 1;
        self.time += dt;
        Ok(())
    }

    fn fluid(&self) -> &FluidParticles {
        &self.fluid
    }

    fn solid(&self) -> &SolidParticles {
        &self.solid
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn step_count(&self) -> u64 {
        self.step_count
    }

    fn error_metrics(&self) -> ErrorMetrics {
        let rho0 = self.params.rho0;
        let max_density_variation = self
            .fluid
            .rho
            .iter()
            .map(|&rho| (rho - rho0).abs() / rho0)
            .fold(0.0, f64::max);

        let current_mass = self.fluid.total_mass();
        let mass_conservation = if self.initial_mass.abs() > 1.0e-300 {
            ((current_mass - self.initial_mass) / self.initial_mass).abs()
        } else {
            (current_mass - self.initial_mass).abs()
        };

        ErrorMetrics {
            max_density_variation,
            mass_conservation,
        }
    }

    fn particle_count(&self) -> usize {
        self.fluid.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::INK;

    fn single_particle_kernel(scheme: IntegratorScheme) -> CpuKernel {
        let params = SphParams {
            scheme,
            ..SphParams::default()
        };
        let mut fluid = FluidParticles::new();
        fluid.push_particle(
            0.8e-3,
            0.5e-3,
            params.particle_mass(),
            params.rho0,
            params.h,
            params.c0,
            INK,
            params.nu,
        );
        CpuKernel::new(
            fluid,
            SolidParticles::new(),
            WallGeometry::flat(45.0, 0.8e-3),
            params,
        )
    }

    #[test]
    fn isolated_particle_free_falls() {
        for scheme in [IntegratorScheme::PredictorCorrector, IntegratorScheme::VelocityVerlet] {
            let mut k = single_particle_kernel(scheme);
            let dt = 1.0e-6;
            for _ in 0..10 {
                k.step(dt).unwrap();
            }
            let t = 10.0 * dt;
            let v = k.fluid().v[0];
            assert!((v + 9.81 * t).abs() < 1.0e-9, "{scheme:?}: v = {v}");
            let drop = 0.5e-3 - k.fluid().y[0];
            assert!((drop - 0.5 * 9.81 * t * t).abs() < 1.0e-12, "{scheme:?}: drop = {drop}");
            assert_eq!(k.step_count(), 10);
            assert!((k.time() - t).abs() < 1.0e-18);
        }
    }

    #[test]
    fn non_finite_state_is_rolled_back() {
        let mut k = single_particle_kernel(IntegratorScheme::PredictorCorrector);
        k.step(1.0e-6).unwrap();
        let before = k.fluid().clone();
        let err = k.step(f64::NAN).unwrap_err();
        match err {
            KernelError::NumericalInstability { step, field, particle, .. } => {
                assert_eq!(step, 1);
                assert_eq!(field, "x");
                assert_eq!(particle, 0);
            }
        }
        assert_eq!(k.fluid().x, before.x);
        assert_eq!(k.fluid().v, before.v);
        assert_eq!(k.step_count(), 1);
    }

    #[test]
    fn rollback_restores_density_and_pressure() {
        let mut k = single_particle_kernel(IntegratorScheme::PredictorCorrector);
        k.step(1.0e-6).unwrap();
        let before = k.fluid().clone();
        assert!(k.step(f64::NAN).is_err());
        assert_eq!(k.fluid().rho, before.rho);
        assert_eq!(k.fluid().p, before.p);
        assert!(k.fluid().rho.iter().chain(k.fluid().p.iter()).all(|v| v.is_finite()));
        assert!(k.error_metrics().max_density_variation.is_finite());
    }

    #[test]
    fn mass_is_conserved_trivially() {
        let mut k = single_particle_kernel(IntegratorScheme::VelocityVerlet);
        k.step(1.0e-6).unwrap();
        let m = k.error_metrics();
        assert_eq!(m.mass_conservation, 0.0);
        assert_eq!(k.particle_count(), 1);
    }
}
