//! Droplet spreading command-line driver
//!
//! `droplet-sph run` sets up and runs a simulation from an optional JSON
//! configuration plus flag overrides, then post-processes the frames.
//! `droplet-sph post-process <dir>` recomputes metrics and plots for an
//! existing output directory.

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use kernel::{CarreauModel, IntegratorScheme, SmoothingKernel};
use orchestrator::config::CavityConfig;
use orchestrator::{postprocess, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "droplet-sph")]
#[command(about = "Two-phase SPH simulation of an ink droplet on a substrate or in a cavity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulation, then post-process its frames
    Run {
        #[command(flatten)]
        overrides: Overrides,
        /// Skip metrics and plots after the run
        #[arg(long, default_value_t = false)]
        no_post_process: bool,
    },
    /// Compute spreading metrics and plots for an output directory
    PostProcess {
        /// Directory holding the frames
        dir: PathBuf,
        /// Configuration to use instead of the copy saved with the frames
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON
    ShowConfig {
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SchemeArg {
    PredictorCorrector,
    VelocityVerlet,
}

impl From<SchemeArg> for IntegratorScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::PredictorCorrector => IntegratorScheme::PredictorCorrector,
            SchemeArg::VelocityVerlet => IntegratorScheme::VelocityVerlet,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KernelArg {
    QuinticSpline,
    WendlandC2,
}

impl From<KernelArg> for SmoothingKernel {
    fn from(arg: KernelArg) -> Self {
        match arg {
            KernelArg::QuinticSpline => SmoothingKernel::QuinticSpline,
            KernelArg::WendlandC2 => SmoothingKernel::WendlandC2,
        }
    }
}

/// Configuration file plus per-parameter overrides
#[derive(Args, Debug, Default)]
struct Overrides {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ink density (kg/m^3)
    #[arg(long)]
    rho0: Option<f64>,
    /// Surface tension (N/m)
    #[arg(long)]
    sigma: Option<f64>,
    /// Kinematic viscosity (m^2/s)
    #[arg(long)]
    nu: Option<f64>,
    /// Particle spacing (m)
    #[arg(long)]
    dx: Option<f64>,
    /// Smoothing length over particle spacing
    #[arg(long)]
    hdx: Option<f64>,
    /// Artificial speed of sound (m/s)
    #[arg(long)]
    c0: Option<f64>,
    /// Droplet radius (m)
    #[arg(long)]
    droplet_radius: Option<f64>,
    /// Droplet centre x (m)
    #[arg(long)]
    droplet_x: Option<f64>,
    /// Gap between the substrate and the bottom of a falling droplet (m)
    #[arg(long)]
    droplet_height: Option<f64>,
    /// Start the droplet in the air
    #[arg(long, overrides_with = "no_falling")]
    falling: bool,
    /// Start the droplet resting on the substrate
    #[arg(long)]
    no_falling: bool,
    /// Contact angle of the flat substrate (degrees)
    #[arg(long)]
    contact_angle: Option<f64>,
    /// Final time (s)
    #[arg(long)]
    tf: Option<f64>,
    /// Stop after this many steps
    #[arg(long)]
    max_steps: Option<u64>,
    /// Use the five-segment cavity instead of a flat substrate
    #[arg(long)]
    cavity: bool,
    /// Cavity floor contact angle (degrees)
    #[arg(long)]
    theta_bottom: Option<f64>,
    /// Cavity left wall contact angle (degrees)
    #[arg(long)]
    theta_left_wall: Option<f64>,
    /// Cavity right wall contact angle (degrees)
    #[arg(long)]
    theta_right_wall: Option<f64>,
    /// Left platform contact angle (degrees)
    #[arg(long)]
    theta_left_platform: Option<f64>,
    /// Right platform contact angle (degrees)
    #[arg(long)]
    theta_right_platform: Option<f64>,
    /// Enable Carreau shear-thinning rheology
    #[arg(long)]
    carreau: bool,
    /// Carreau zero-shear viscosity (Pa.s)
    #[arg(long)]
    eta0: Option<f64>,
    /// Carreau infinite-shear viscosity (Pa.s)
    #[arg(long)]
    eta_inf: Option<f64>,
    /// Carreau time constant (s)
    #[arg(long)]
    carreau_lambda: Option<f64>,
    /// Carreau power-law index
    #[arg(long)]
    carreau_n: Option<f64>,
    /// Adhesion strength
    #[arg(long)]
    alpha: Option<f64>,
    /// Rotate near-wall interface normals toward the contact angle
    #[arg(long)]
    wall_normal_correction: bool,
    /// Output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Steps between saved frames
    #[arg(long)]
    output_interval: Option<u64>,
    /// Time integration scheme
    #[arg(long, value_enum)]
    integrator: Option<SchemeArg>,
    /// Smoothing kernel
    #[arg(long, value_enum)]
    kernel: Option<KernelArg>,
}

impl Overrides {
    /// Load the base configuration (file or defaults), apply every flag and
    /// validate the result.
    fn resolve(&self) -> Result<SimulationConfig, orchestrator::ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                SimulationConfig::load(path)?
            }
            None => SimulationConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut SimulationConfig) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut config.physics.rho0, self.rho0);
        set(&mut config.physics.sigma, self.sigma);
        set(&mut config.physics.nu, self.nu);
        set(&mut config.physics.c0, self.c0);
        set(&mut config.particle_spacing, self.dx);
        set(&mut config.hdx, self.hdx);
        set(&mut config.droplet.radius, self.droplet_radius);
        set(&mut config.droplet.x_center, self.droplet_x);
        set(&mut config.contact_angle, self.contact_angle);
        set(&mut config.end_time, self.tf);
        set(&mut config.adhesion.alpha, self.alpha);
        set(&mut config.output.interval, self.output_interval);
        if self.droplet_height.is_some() {
            config.droplet.gap = self.droplet_height;
        }
        if self.falling {
            config.droplet.falling = true;
        }
        if self.no_falling {
            config.droplet.falling = false;
        }
        if self.wall_normal_correction {
            config.wall_normal_correction.enabled = true;
        }
        if self.max_steps.is_some() {
            config.max_timesteps = self.max_steps;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(scheme) = self.integrator {
            config.integrator = scheme.into();
        }
        if let Some(kernel) = self.kernel {
            config.kernel = kernel.into();
        }

        if self.cavity && config.cavity.is_none() {
            config.cavity = Some(CavityConfig::default());
        }
        let thetas = [
            self.theta_bottom,
            self.theta_left_wall,
            self.theta_right_wall,
            self.theta_left_platform,
            self.theta_right_platform,
        ];
        match config.cavity.as_mut() {
            Some(cavity) => {
                let a = &mut cavity.angles;
                set(&mut a.bottom, self.theta_bottom);
                set(&mut a.left_wall, self.theta_left_wall);
                set(&mut a.right_wall, self.theta_right_wall);
                set(&mut a.left_ledge, self.theta_left_platform);
                set(&mut a.right_ledge, self.theta_right_platform);
            }
            None if thetas.iter().any(Option::is_some) => {
                tracing::warn!("cavity contact angles ignored: cavity geometry is not enabled");
            }
            None => {}
        }

        if self.carreau && config.carreau.is_none() {
            config.carreau = Some(CarreauModel::default());
        }
        let carreau = [self.eta0, self.eta_inf, self.carreau_lambda, self.carreau_n];
        match config.carreau.as_mut() {
            Some(model) => {
                set(&mut model.eta0, self.eta0);
                set(&mut model.eta_inf, self.eta_inf);
                set(&mut model.lambda, self.carreau_lambda);
                set(&mut model.n, self.carreau_n);
            }
            None if carreau.iter().any(Option::is_some) => {
                tracing::warn!("Carreau parameters ignored: Carreau rheology is not enabled");
            }
            None => {}
        }
    }
}

fn run(overrides: &Overrides, post: bool) -> Result<(), Box<dyn Error>> {
    let config = overrides.resolve()?;
    let mut runner = orchestrator::create_simulation(&config)?;
    let summary = runner.run()?;
    if summary.stopped {
        tracing::warn!("Run stopped before the final time");
    }
    if post {
        postprocess::post_process(&config.output.directory, &config)?;
    }
    Ok(())
}

fn post_process(dir: &Path, config: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(path) => SimulationConfig::load(path)?,
        None => orchestrator::load_run_config(dir)?,
    };
    let output = postprocess::post_process(dir, &config)?;
    tracing::info!(
        "Post-processing complete: {} frames, {} plots",
        output.metrics.len(),
        output.plots.len()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "droplet_sph=info,orchestrator=info,kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            overrides,
            no_post_process,
        } => run(&overrides, !no_post_process),
        Command::PostProcess { dir, config } => post_process(&dir, config.as_deref()),
        Command::ShowConfig { overrides } => {
            let config = overrides.resolve()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(args: &[&str]) -> Overrides {
        let mut argv = vec!["droplet-sph", "show-config"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::ShowConfig { overrides } => overrides,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_flags_give_defaults() {
        let config = overrides(&[]).resolve().unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn physical_flags_override_defaults() {
        let config = overrides(&[
            "--rho0", "2500", "--sigma", "0.03", "--dx", "2e-5", "--hdx", "1.2", "--tf", "0.002",
            "--contact-angle", "60", "--alpha", "20", "--droplet-height", "1e-4",
        ])
        .resolve()
        .unwrap();
        assert_eq!(config.physics.rho0, 2500.0);
        assert_eq!(config.physics.sigma, 0.03);
        assert_eq!(config.particle_spacing, 2e-5);
        assert_eq!(config.hdx, 1.2);
        assert_eq!(config.end_time, 0.002);
        assert_eq!(config.contact_angle, 60.0);
        assert_eq!(config.adhesion.alpha, 20.0);
        assert_eq!(config.droplet.gap, Some(1e-4));
        assert!((config.droplet_center()[1] - 2.5e-4).abs() < 1e-15);
    }

    #[test]
    fn cavity_and_carreau_flags() {
        let config = overrides(&[
            "--cavity", "--theta-bottom", "20", "--theta-right-wall", "100", "--carreau", "--eta0", "0.8",
            "--carreau-n", "0.6", "--integrator", "velocity-verlet", "--kernel", "wendland-c2",
        ])
        .resolve()
        .unwrap();
        let cavity = config.cavity.unwrap();
        assert_eq!(cavity.angles.bottom, 20.0);
        assert_eq!(cavity.angles.right_wall, 100.0);
        assert_eq!(cavity.angles.left_wall, 45.0);
        let model = config.carreau.unwrap();
        assert_eq!(model.eta0, 0.8);
        assert_eq!(model.n, 0.6);
        assert_eq!(model.eta_inf, CarreauModel::default().eta_inf);
        assert_eq!(config.integrator, IntegratorScheme::VelocityVerlet);
        assert_eq!(config.kernel, SmoothingKernel::WendlandC2);
    }

    #[test]
    fn wall_normal_correction_flag() {
        assert!(!overrides(&[]).resolve().unwrap().wall_normal_correction.enabled);
        let config = overrides(&["--wall-normal-correction"]).resolve().unwrap();
        assert!(config.wall_normal_correction.enabled);
        assert_eq!(config.sph_params().wall_normal_correction.delta, 2.0);
    }

    #[test]
    fn falling_flags_toggle() {
        assert!(!overrides(&["--no-falling"]).resolve().unwrap().droplet.falling);
        assert!(overrides(&["--falling"]).resolve().unwrap().droplet.falling);
    }

    #[test]
    fn invalid_override_is_rejected() {
        assert!(overrides(&["--droplet-radius=-1e-4"]).resolve().is_err());
        assert!(overrides(&["--carreau", "--eta-inf", "2.0"]).resolve().is_err());
    }
}
