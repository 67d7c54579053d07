//! Configuration parsing and validation for droplet simulations

use std::fs;
use std::path::{Path, PathBuf};

use kernel::params::{
    AdhesionParams, ArtificialStressParams, InterfaceParams, RepulsionParams, WallNormalCorrection,
};
use kernel::{
    CarreauModel, CavityAngles, CavityDims, IntegratorScheme, SmoothingKernel, SphParams,
    TimestepLimits, WallGeometry,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    #[serde(default = "default_name")]
    pub name: String,
    /// Fluid box above the substrate
    #[serde(default)]
    pub domain: DomainConfig,
    /// Droplet size and placement
    #[serde(default)]
    pub droplet: DropletConfig,
    /// Material and EOS constants
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Initial inter-particle distance (meters)
    #[serde(default = "default_particle_spacing")]
    pub particle_spacing: f64,
    /// Smoothing length over particle spacing
    #[serde(default = "default_hdx")]
    pub hdx: f64,
    /// Contact angle of the flat substrate (degrees)
    #[serde(default = "default_contact_angle")]
    pub contact_angle: f64,
    /// Cavity geometry; `None` selects the flat substrate
    #[serde(default)]
    pub cavity: Option<CavityConfig>,
    /// Carreau shear-thinning; `None` keeps the viscosity Newtonian
    #[serde(default)]
    pub carreau: Option<CarreauModel>,
    /// Contact-angle adhesion
    #[serde(default)]
    pub adhesion: AdhesionParams,
    /// Wall repulsion
    #[serde(default)]
    pub repulsion: RepulsionParams,
    /// Interface detection
    #[serde(default)]
    pub interface: InterfaceParams,
    /// Anti-clustering stress
    #[serde(default)]
    pub artificial_stress: ArtificialStressParams,
    /// Contact-angle rotation of near-wall interface normals
    #[serde(default)]
    pub wall_normal_correction: WallNormalCorrection,
    /// Smoothing kernel
    #[serde(default)]
    pub kernel: SmoothingKernel,
    /// Time integration scheme
    #[serde(default)]
    pub integrator: IntegratorScheme,
    /// Number of boundary particle layers behind each wall
    #[serde(default = "default_solid_layers")]
    pub solid_layers: usize,
    /// Final simulated time (seconds)
    #[serde(default = "default_end_time")]
    pub end_time: f64,
    /// Stop after this many timesteps even if `end_time` is not reached
    #[serde(default)]
    pub max_timesteps: Option<u64>,
    /// Snapshot output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Fluid box, spanning x in [0, width] and y in [0, height]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Width (m)
    #[serde(default = "default_domain_width")]
    pub width: f64,
    /// Height (m)
    #[serde(default = "default_domain_height")]
    pub height: f64,
}

/// Droplet size and initial placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropletConfig {
    /// Radius (m)
    #[serde(default = "default_droplet_radius")]
    pub radius: f64,
    /// Centre x (m)
    #[serde(default = "default_droplet_x")]
    pub x_center: f64,
    /// Centre y of a falling droplet (m)
    #[serde(default = "default_droplet_y")]
    pub y_center: f64,
    /// Gap between the substrate and the bottom of a falling droplet (m);
    /// overrides `y_center` when set
    #[serde(default)]
    pub gap: Option<f64>,
    /// Start in the air (ink only) rather than resting on the substrate
    /// surrounded by air
    #[serde(default = "default_falling")]
    pub falling: bool,
}

/// Material and equation-of-state constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Ink density (kg/m^3)
    #[serde(default = "default_rho0")]
    pub rho0: f64,
    /// Surface tension (N/m)
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Kinematic viscosity (m^2/s)
    #[serde(default = "default_nu")]
    pub nu: f64,
    /// Artificial speed of sound (m/s)
    #[serde(default = "default_c0")]
    pub c0: f64,
    /// Gravity vector (m/s^2)
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 2],
    /// EOS exponent
    #[serde(default = "default_eos_exponent")]
    pub eos_exponent: f64,
}

/// Cavity placement and per-segment contact angles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CavityConfig {
    /// Wall and floor positions
    #[serde(default)]
    pub dims: CavityDims,
    /// Contact angles (degrees)
    #[serde(default)]
    pub angles: CavityAngles,
}

/// Where and how often frames are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    /// Steps between saved frames
    #[serde(default = "default_output_interval")]
    pub interval: u64,
}

// Default values
fn default_name() -> String {
    "droplet".to_string()
}

fn default_domain_width() -> f64 {
    1.6e-3
}

fn default_domain_height() -> f64 {
    0.8e-3
}

fn default_droplet_radius() -> f64 {
    0.15e-3
}

fn default_droplet_x() -> f64 {
    0.8e-3
}

fn default_droplet_y() -> f64 {
    0.3e-3
}

fn default_falling() -> bool {
    true
}

fn default_rho0() -> f64 {
    3000.0
}

fn default_sigma() -> f64 {
    0.04
}

fn default_nu() -> f64 {
    5.0e-4
}

fn default_c0() -> f64 {
    10.0
}

fn default_gravity() -> [f64; 2] {
    [0.0, -9.81]
}

fn default_eos_exponent() -> f64 {
    kernel::eos::DEFAULT_EOS_EXPONENT
}

fn default_particle_spacing() -> f64 {
    1.0e-5
}

fn default_hdx() -> f64 {
    1.3
}

fn default_contact_angle() -> f64 {
    45.0
}

fn default_solid_layers() -> usize {
    3
}

fn default_end_time() -> f64 {
    0.01
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("droplet_output")
}

fn default_output_interval() -> u64 {
    100
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            width: default_domain_width(),
            height: default_domain_height(),
        }
    }
}

impl Default for DropletConfig {
    fn default() -> Self {
        Self {
            radius: default_droplet_radius(),
            x_center: default_droplet_x(),
            y_center: default_droplet_y(),
            gap: None,
            falling: default_falling(),
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            rho0: default_rho0(),
            sigma: default_sigma(),
            nu: default_nu(),
            c0: default_c0(),
            gravity: default_gravity(),
            eos_exponent: default_eos_exponent(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            interval: default_output_interval(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            domain: DomainConfig::default(),
            droplet: DropletConfig::default(),
            physics: PhysicsConfig::default(),
            particle_spacing: default_particle_spacing(),
            hdx: default_hdx(),
            contact_angle: default_contact_angle(),
            cavity: None,
            carreau: None,
            adhesion: AdhesionParams::default(),
            repulsion: RepulsionParams::default(),
            interface: InterfaceParams::default(),
            artificial_stress: ArtificialStressParams::default(),
            wall_normal_correction: WallNormalCorrection::default(),
            kernel: SmoothingKernel::default(),
            integrator: IntegratorScheme::default(),
            solid_layers: default_solid_layers(),
            end_time: default_end_time(),
            max_timesteps: None,
            output: OutputConfig::default(),
        }
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(name, format!("must be positive, got {value}")))
    }
}

fn require_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(name, format!("must be non-negative, got {value}")))
    }
}

fn require_angle(name: &'static str, degrees: f64) -> Result<(), ConfigError> {
    if (0.0..=180.0).contains(&degrees) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            format!("contact angle must lie in [0, 180] degrees, got {degrees}"),
        ))
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SimulationConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the configuration
    ///
    /// Rejects out-of-range physical parameters, contradictory rheology,
    /// droplets that do not fit the domain, and wall geometry that cannot be
    /// tiled on the particle lattice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("domain.width", self.domain.width)?;
        require_positive("domain.height", self.domain.height)?;
        require_positive("particle_spacing", self.particle_spacing)?;
        require_positive("hdx", self.hdx)?;

        require_positive("physics.rho0", self.physics.rho0)?;
        require_non_negative("physics.sigma", self.physics.sigma)?;
        require_non_negative("physics.nu", self.physics.nu)?;
        require_positive("physics.c0", self.physics.c0)?;
        require_positive("physics.eos_exponent", self.physics.eos_exponent)?;
        if !self.physics.gravity.iter().all(|g| g.is_finite()) {
            return Err(ConfigError::invalid("physics.gravity", "must be finite"));
        }

        require_positive("droplet.radius", self.droplet.radius)?;
        require_positive("end_time", self.end_time)?;
        if self.output.interval == 0 {
            return Err(ConfigError::invalid("output.interval", "must be at least 1"));
        }
        if self.solid_layers == 0 {
            return Err(ConfigError::invalid("solid_layers", "must be at least 1"));
        }
        if self.max_timesteps == Some(0) {
            return Err(ConfigError::invalid("max_timesteps", "must be at least 1"));
        }

        // Droplet placement
        let r = self.droplet.radius;
        let [cx, cy] = self.droplet_center();
        if cx - r < 0.0 || cx + r > self.domain.width {
            return Err(ConfigError::invalid(
                "droplet.x_center",
                format!(
                    "droplet [{:e}, {:e}] m does not fit the domain width {:e} m",
                    cx - r,
                    cx + r,
                    self.domain.width
                ),
            ));
        }
        if cy + r > self.domain.height {
            return Err(ConfigError::invalid(
                "droplet.y_center",
                format!("droplet top {:e} m is above the domain height {:e} m", cy + r, self.domain.height),
            ));
        }
        if let Some(gap) = self.droplet.gap {
            require_non_negative("droplet.gap", gap)?;
        }
        if self.droplet.falling && cy - r < 0.0 {
            return Err(ConfigError::invalid(
                "droplet.y_center",
                format!("falling droplet bottom {:e} m is below the substrate", cy - r),
            ));
        }

        // Contact angles
        match &self.cavity {
            None => require_angle("contact_angle", self.contact_angle)?,
            Some(cavity) => {
                let a = &cavity.angles;
                require_angle("cavity.angles.bottom", a.bottom)?;
                require_angle("cavity.angles.left_wall", a.left_wall)?;
                require_angle("cavity.angles.right_wall", a.right_wall)?;
                require_angle("cavity.angles.left_ledge", a.left_ledge)?;
                require_angle("cavity.angles.right_ledge", a.right_ledge)?;
            }
        }

        if let Some(model) = &self.carreau {
            model.check()?;
        }

        require_non_negative("adhesion.alpha", self.adhesion.alpha)?;
        require_positive("adhesion.delta", self.adhesion.delta)?;
        require_non_negative("repulsion.stiffness", self.repulsion.stiffness)?;
        require_positive("repulsion.exponent", self.repulsion.exponent)?;
        if let Some(cutoff) = self.repulsion.cutoff {
            require_positive("repulsion.cutoff", cutoff)?;
        }

        let band = &self.interface;
        require_positive("interface.h_scale", band.h_scale)?;
        require_non_negative("interface.normal_threshold", band.normal_threshold)?;
        if !(0.0 < band.band_low && band.band_low < band.band_high && band.band_high < 1.0) {
            return Err(ConfigError::invalid(
                "interface.band_low",
                format!(
                    "interface band must satisfy 0 < low < high < 1, got ({}, {})",
                    band.band_low, band.band_high
                ),
            ));
        }
        require_non_negative("artificial_stress.epsilon", self.artificial_stress.epsilon)?;
        require_positive("wall_normal_correction.delta", self.wall_normal_correction.delta)?;

        self.geometry()
            .validate(self.particle_spacing, self.domain.width, self.solid_layers)?;

        Ok(())
    }

    /// Calculate smoothing length from particle spacing
    pub fn smoothing_length(&self) -> f64 {
        self.hdx * self.particle_spacing
    }

    /// Initial droplet centre.
    ///
    /// A resting droplet sits with its centre one radius above the substrate.
    /// A falling droplet uses `gap + radius` when a gap is given.
    pub fn droplet_center(&self) -> [f64; 2] {
        let d = &self.droplet;
        let y = if !d.falling {
            d.radius
        } else {
            d.gap.map_or(d.y_center, |gap| gap + d.radius)
        };
        [d.x_center, y]
    }

    /// Wall geometry selected by this configuration
    pub fn geometry(&self) -> WallGeometry {
        match &self.cavity {
            Some(cavity) => WallGeometry::cavity(cavity.dims, cavity.angles),
            None => WallGeometry::flat(self.contact_angle, self.droplet.x_center),
        }
    }

    /// Kernel parameters
    pub fn sph_params(&self) -> SphParams {
        SphParams {
            rho0: self.physics.rho0,
            c0: self.physics.c0,
            eos_exponent: self.physics.eos_exponent,
            gravity: self.physics.gravity,
            sigma: self.physics.sigma,
            nu: self.physics.nu,
            dx: self.particle_spacing,
            h: self.smoothing_length(),
            kernel: self.kernel,
            interface: self.interface,
            adhesion: self.adhesion,
            repulsion: self.repulsion,
            artificial_stress: self.artificial_stress,
            wall_normal_correction: self.wall_normal_correction,
            carreau: self.carreau,
            scheme: self.integrator,
        }
    }

    /// Stability bounds and the fixed time step
    pub fn timestep(&self) -> TimestepLimits {
        let params = self.sph_params();
        TimestepLimits::new(
            params.h,
            params.c0,
            params.effective_nu(),
            params.rho0,
            params.sigma,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::CarreauError;

    #[test]
    fn test_smoothing_length() {
        let config = SimulationConfig {
            particle_spacing: 2.0e-5,
            hdx: 1.5,
            ..SimulationConfig::default()
        };
        assert!((config.smoothing_length() - 3.0e-5).abs() < 1e-18);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.droplet_center(), [0.8e-3, 0.3e-3]);
        assert_eq!(config.timestep().limiting(), "viscous");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "name": "cavity run",
            "droplet": { "gap": 0.1e-3 },
            "cavity": { "angles": { "bottom": 20.0 } },
            "carreau": { "n": 0.5 },
            "wall_normal_correction": { "enabled": true },
            "integrator": "velocity_verlet"
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "cavity run");
        assert_eq!(config.particle_spacing, 1.0e-5);
        let cavity = config.cavity.unwrap();
        assert_eq!(cavity.angles.bottom, 20.0);
        assert_eq!(cavity.angles.right_wall, 90.0);
        assert_eq!(cavity.dims, CavityDims::default());
        let carreau = config.carreau.unwrap();
        assert_eq!(carreau.n, 0.5);
        assert_eq!(carreau.eta0, 0.5);
        assert_eq!(config.integrator, IntegratorScheme::VelocityVerlet);
        assert!(config.wall_normal_correction.enabled);
        assert_eq!(config.wall_normal_correction.delta, 2.0);
        let [_, cy] = config.droplet_center();
        assert!((cy - 0.25e-3).abs() < 1e-15);
        config.validate().unwrap();
    }

    #[test]
    fn test_resting_droplet_sits_on_substrate() {
        let mut config = SimulationConfig::default();
        config.droplet.falling = false;
        config.droplet.gap = Some(0.2e-3);
        assert_eq!(config.droplet_center(), [0.8e-3, 0.15e-3]);
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        let mut config = SimulationConfig::default();
        config.droplet.radius = -1.0e-4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "droplet.radius", .. })
        ));

        let mut config = SimulationConfig::default();
        config.physics.nu = -1.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.carreau = Some(CarreauModel {
            eta_inf: 1.0,
            ..CarreauModel::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Carreau(CarreauError::InvertedViscosities { .. }))
        ));

        let mut config = SimulationConfig::default();
        config.contact_angle = 200.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.droplet.x_center = 1.55e-3;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.output.interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_misaligned_cavity() {
        let mut config = SimulationConfig {
            cavity: Some(CavityConfig::default()),
            ..SimulationConfig::default()
        };
        config.validate().unwrap();
        if let Some(cavity) = config.cavity.as_mut() {
            cavity.dims.x_wall_left = 0.4035e-3;
        }
        assert!(matches!(config.validate(), Err(ConfigError::Geometry(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("droplet-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        let config = SimulationConfig {
            name: "saved".to_string(),
            carreau: Some(CarreauModel::default()),
            ..SimulationConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimulationConfig::load("/nonexistent/droplet.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
