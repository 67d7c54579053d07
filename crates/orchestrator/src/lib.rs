//! Orchestration Layer
//!
//! This crate drives the droplet kernel end to end:
//! - JSON configuration with validation
//! - Fluid and boundary particle setup for a flat substrate or a cavity
//! - A fixed-step runner that writes snapshot frames on a background thread
//! - Post-processing into spreading metrics and plots

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod error;
pub mod postprocess;
pub mod runner;
pub mod snapshot;

pub use config::SimulationConfig;
pub use error::{ConfigError, Error, SnapshotError};
pub use runner::{RunSummary, RunnerState, SimulationRunner};

use std::fs;
use std::path::Path;

use kernel::CpuKernel;

/// Copy of the run configuration written into the output directory, so the
/// frames can be post-processed without the original file.
pub const CONFIG_FILE: &str = "config.json";

/// Create a complete simulation from a configuration
///
/// This function performs the full simulation setup pipeline:
/// 1. Validate the configuration
/// 2. Build the wall geometry and check it tiles the lattice
/// 3. Place fluid and boundary particles
/// 4. Choose the fixed time step from the stability bounds
/// 5. Create the CPU simulation kernel
/// 6. Wrap it in a SimulationRunner
///
/// The configuration is also saved as `config.json` in the output directory.
///
/// # Example
/// ```no_run
/// use orchestrator::{create_simulation, SimulationConfig};
///
/// let config = SimulationConfig::load("configs/cavity.json")?;
/// let mut runner = create_simulation(&config)?;
/// let summary = runner.run()?;
/// println!("{} frames written", summary.frames.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config: &SimulationConfig) -> Result<SimulationRunner, Error> {
    tracing::info!("Creating simulation: {}", config.name);

    // 1. Validate configuration
    config.validate()?;

    // 2. Wall geometry
    let geometry = config.geometry();
    match geometry.cavity_dims() {
        Some(dims) => {
            tracing::info!(
                "Cavity geometry: walls at x={:.3} mm and x={:.3} mm, bottom at y={:.3} mm",
                dims.x_wall_left * 1e3,
                dims.x_wall_right * 1e3,
                dims.y_bottom * 1e3
            );
            for segment in geometry.segments() {
                tracing::info!("  {}: theta={} deg", segment.name(), segment.contact_angle_deg);
            }
        }
        None => tracing::info!("Flat substrate: theta={} deg", config.contact_angle),
    }
    if let Some(model) = &config.carreau {
        tracing::info!(
            "Carreau rheology: eta0={} Pa.s, eta_inf={} Pa.s, lambda={} s, n={}",
            model.eta0,
            model.eta_inf,
            model.lambda,
            model.n
        );
    }

    // 3. Particles
    tracing::info!("Setting up simulation domain...");
    let (fluid, solid) = domain::setup_domain(config)?;

    // 4. Time step
    let limits = config.timestep();
    tracing::info!(
        "Time step {:.3e} s (acoustic {:.3e}, viscous {:.3e}, capillary {:.3e}; {} limited)",
        limits.dt,
        limits.acoustic,
        limits.viscous,
        limits.capillary,
        limits.limiting()
    );

    // 5. Kernel
    tracing::info!("Creating CPU simulation kernel...");
    let kernel = CpuKernel::new(fluid, solid, geometry, config.sph_params());

    // Keep the configuration with the frames
    let dir = &config.output.directory;
    fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
        path: dir.clone(),
        source,
    })?;
    config.save(dir.join(CONFIG_FILE))?;

    // 6. Runner
    let runner = SimulationRunner::new(
        Box::new(kernel),
        limits.dt,
        config.end_time,
        config.max_timesteps,
        config.output.clone(),
    );
    tracing::info!("Simulation ready to start");
    Ok(runner)
}

/// Configuration saved alongside the frames in `dir`.
pub fn load_run_config(dir: &Path) -> Result<SimulationConfig, ConfigError> {
    SimulationConfig::load(dir.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainConfig, OutputConfig};
    use kernel::SimulationKernel;

    fn small_config(tag: &str) -> SimulationConfig {
        let mut config = SimulationConfig {
            name: format!("small-{tag}"),
            domain: DomainConfig {
                width: 2.0e-4,
                height: 1.0e-4,
            },
            end_time: 1.0,
            max_timesteps: Some(6),
            output: OutputConfig {
                directory: std::env::temp_dir().join(format!("droplet-lib-{tag}-{}", std::process::id())),
                interval: 3,
            },
            ..SimulationConfig::default()
        };
        config.droplet.radius = 3.0e-5;
        config.droplet.x_center = 1.0e-4;
        config.droplet.y_center = 5.0e-5;
        let _ = fs::remove_dir_all(&config.output.directory);
        config
    }

    #[test]
    fn create_and_run_small_simulation() {
        let config = small_config("run");
        let mut runner = create_simulation(&config).unwrap();
        assert_eq!(runner.state(), RunnerState::Initialized);
        assert!((runner.dt() - config.timestep().dt).abs() < 1e-20);
        let n = runner.kernel().particle_count();

        let summary = runner.run().unwrap();
        assert_eq!(summary.steps, 6);
        assert_eq!(summary.frames.len(), 3);
        assert_eq!(runner.kernel().particle_count(), n);

        let saved = load_run_config(&config.output.directory).unwrap();
        assert_eq!(saved, config);
        fs::remove_dir_all(&config.output.directory).ok();
    }

    #[test]
    fn invalid_config_fails_before_any_output() {
        let mut config = small_config("invalid");
        config.physics.c0 = 0.0;
        assert!(matches!(
            create_simulation(&config),
            Err(Error::Config(ConfigError::InvalidParameter { name: "physics.c0", .. }))
        ));
        assert!(!config.output.directory.exists());
    }
}
