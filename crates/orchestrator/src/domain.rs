//! Domain setup: fluid particle placement and boundary particle generation

use kernel::particle::{AIR, INK};
use kernel::{FluidParticles, GeometryError, SolidParticles, SphParams};

use crate::config::SimulationConfig;

/// Set up the simulation domain with fluid and boundary particles
///
/// A falling droplet is placed alone (ink only) on a lattice symmetric about
/// its centre, so a centred drop has no lateral bias. A resting droplet is
/// cut out of a lattice filling the whole box (and the cavity, if any), the
/// rest of which is air.
///
/// Returns (fluid_particles, solid_particles)
pub fn setup_domain(
    config: &SimulationConfig,
) -> Result<(FluidParticles, SolidParticles), GeometryError> {
    let params = config.sph_params();
    let geometry = config.geometry();

    let fluid = if config.droplet.falling {
        place_falling_droplet(config, &params)
    } else {
        place_resting_droplet(config, &params)
    };

    let solid = geometry.build_solid(
        config.particle_spacing,
        config.solid_layers,
        config.domain.width,
        params.rho0,
    )?;

    let n_ink = fluid.ink_count();
    tracing::info!(
        "Domain setup complete: {} fluid particles ({} ink, {} air), {} solid particles",
        fluid.len(),
        n_ink,
        fluid.len() - n_ink,
        solid.len()
    );

    Ok((fluid, solid))
}

fn push(fluid: &mut FluidParticles, params: &SphParams, x: f64, y: f64, color: f64) {
    fluid.push_particle(
        x,
        y,
        params.particle_mass(),
        params.rho0,
        params.h,
        params.c0,
        color,
        params.nu,
    );
}

/// Ink-only disc on a lattice centred on the droplet centre
fn place_falling_droplet(config: &SimulationConfig, params: &SphParams) -> FluidParticles {
    let dx = config.particle_spacing;
    let r = config.droplet.radius;
    let [cx, cy] = config.droplet_center();
    let n_half = (r / dx).ceil() as i64;

    let mut fluid = FluidParticles::new();
    for j in -n_half..=n_half {
        let y = cy + j as f64 * dx;
        for i in -n_half..=n_half {
            let x = cx + i as f64 * dx;
            if (x - cx).hypot(y - cy) <= r {
                push(&mut fluid, params, x, y, INK);
            }
        }
    }
    fluid
}

/// Full box of air with an ink cap resting on the substrate
fn place_resting_droplet(config: &SimulationConfig, params: &SphParams) -> FluidParticles {
    let dx = config.particle_spacing;
    let r = config.droplet.radius;
    let [cx, cy] = config.droplet_center();
    let cell = |k: i64| (k as f64 + 0.5) * dx;
    let count = |extent: f64| ((extent - 0.5 * dx) / dx).ceil().max(0.0) as i64;

    let phase = |x: f64, y: f64| {
        if (x - cx).hypot(y - cy) <= r && y >= 0.0 {
            INK
        } else {
            AIR
        }
    };

    let mut fluid = FluidParticles::new();
    for j in 0..count(config.domain.height) {
        for i in 0..count(config.domain.width) {
            let (x, y) = (cell(i), cell(j));
            push(&mut fluid, params, x, y, phase(x, y));
        }
    }

    // Cavity interior, below the ledges
    if let Some(dims) = config.geometry().cavity_dims() {
        let iwl = (dims.x_wall_left / dx).round() as i64;
        let iwr = (dims.x_wall_right / dx).round() as i64;
        let depth = (-dims.y_bottom / dx).round() as i64;
        for k in 0..depth {
            for i in iwl..iwr {
                let (x, y) = (cell(i), -cell(k));
                push(&mut fluid, params, x, y, phase(x, y));
            }
        }
    }
    fluid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CavityConfig;

    fn expected_ink(config: &SimulationConfig) -> f64 {
        let r = config.droplet.radius / config.particle_spacing;
        std::f64::consts::PI * r * r
    }

    #[test]
    fn falling_droplet_is_ink_only_and_symmetric() {
        let config = SimulationConfig::default();
        let (fluid, solid) = setup_domain(&config).unwrap();
        assert_eq!(fluid.ink_count(), fluid.len());
        let ratio = fluid.len() as f64 / expected_ink(&config);
        assert!((ratio - 1.0).abs() < 0.15, "ink/expected = {ratio}");

        let centroid = fluid.ink_centroid().unwrap();
        assert!((centroid[0] - 0.8e-3).abs() < 1.0e-12);
        assert!((centroid[1] - 0.3e-3).abs() < 1.0e-12);

        // 160 columns, 3 layers
        assert_eq!(solid.len(), 480);
        assert!(solid.y.iter().all(|&y| y < 0.0));
    }

    #[test]
    fn resting_droplet_fills_box_with_air() {
        let mut config = SimulationConfig::default();
        config.droplet.falling = false;
        let (fluid, _) = setup_domain(&config).unwrap();
        assert_eq!(fluid.len(), 160 * 80);
        let ratio = fluid.ink_count() as f64 / expected_ink(&config);
        assert!((ratio - 1.0).abs() < 0.15, "ink/expected = {ratio}");
        for i in 0..fluid.len() {
            if fluid.is_ink(i) {
                assert!(fluid.y[i] >= 0.0);
                assert!(fluid.y[i] <= 0.3e-3 + 1.0e-12);
            }
        }
        let expected_mass = fluid.len() as f64 * 3000.0 * 1.0e-10;
        assert!((fluid.total_mass() - expected_mass).abs() < 1.0e-9 * expected_mass);
    }

    #[test]
    fn resting_droplet_over_cavity_fills_interior_with_air() {
        let mut config = SimulationConfig {
            cavity: Some(CavityConfig::default()),
            ..SimulationConfig::default()
        };
        config.droplet.falling = false;
        let (fluid, solid) = setup_domain(&config).unwrap();
        // 80 columns between the walls, 13 rows down to the floor
        assert_eq!(fluid.len(), 160 * 80 + 80 * 13);
        let below: Vec<usize> = (0..fluid.len()).filter(|&i| fluid.y[i] < 0.0).collect();
        assert_eq!(below.len(), 80 * 13);
        assert!(below.iter().all(|&i| !fluid.is_ink(i)));

        let dx = config.particle_spacing;
        for i in 0..fluid.len() {
            for k in 0..solid.len() {
                let d = (fluid.x[i] - solid.x[k]).hypot(fluid.y[i] - solid.y[k]);
                assert!(d > 0.99 * dx, "fluid {i} overlaps solid {k}");
            }
        }
    }
}
