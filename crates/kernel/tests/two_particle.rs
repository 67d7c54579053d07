//! Two-particle symmetry test.
//!
//! Verifies Newton's 3rd law (accelerations equal and opposite) and momentum
//! conservation for an isolated pair of equal-mass ink particles, away from
//! any wall and without gravity.

use kernel::particle::INK;
use kernel::{CpuKernel, FluidParticles, SimulationKernel, SolidParticles, SphParams, WallGeometry};

fn setup_two_particles(separation: f64, params: &SphParams) -> FluidParticles {
    let mut fluid = FluidParticles::new();
    for x in [0.8e-3, 0.8e-3 + separation] {
        fluid.push_particle(
            x,
            0.5e-3,
            params.particle_mass(),
            params.rho0,
            params.h,
            params.c0,
            INK,
            params.nu,
        );
    }
    fluid
}

fn pair_kernel(separation: f64) -> CpuKernel {
    let params = SphParams {
        gravity: [0.0, 0.0],
        ..SphParams::default()
    };
    let fluid = setup_two_particles(separation, &params);
    CpuKernel::new(fluid, SolidParticles::new(), WallGeometry::flat(45.0, 0.8e-3), params)
}

#[test]
fn forces_equal_and_opposite() {
    let mut kernel = pair_kernel(1.0e-5);
    kernel.compute_accelerations();
    let p = kernel.fluid();

    eprintln!("a0 = ({:e}, {:e}), a1 = ({:e}, {:e})", p.au[0], p.av[0], p.au[1], p.av[1]);
    assert!(p.au[0] != 0.0, "pair should interact");
    let scale = p.au[0].abs();
    assert!((p.au[0] + p.au[1]).abs() < 1.0e-9 * scale);
    assert!((p.av[0] + p.av[1]).abs() < 1.0e-9 * scale);
    // Both particles are under tension (isolated pair) and attract
    assert!(p.au[0] > 0.0);
}

#[test]
fn momentum_conserved_over_steps() {
    let mut kernel = pair_kernel(1.0e-5);
    for _ in 0..20 {
        kernel.step(2.0e-8).expect("pair stays finite");
    }
    let p = kernel.fluid();
    let px: f64 = (0..2).map(|i| p.mass[i] * p.u[i]).sum();
    let py: f64 = (0..2).map(|i| p.mass[i] * p.v[i]).sum();
    let scale = p.mass[0] * p.u[0].abs();
    eprintln!("momentum = ({px:e}, {py:e}), scale = {scale:e}");
    assert!(scale > 0.0, "pair should have moved");
    assert!(px.abs() < 1.0e-9 * scale);
    assert_eq!(py, 0.0);
}

#[test]
fn distant_pair_does_not_interact() {
    let mut kernel = pair_kernel(1.0e-4);
    kernel.compute_accelerations();
    let p = kernel.fluid();
    assert_eq!(p.au, vec![0.0, 0.0]);
    assert_eq!(p.av, vec![0.0, 0.0]);
}
