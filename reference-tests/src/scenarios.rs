//! Droplet reference scenarios built from the shipped configurations.

use kernel::CarreauModel;
use orchestrator::{ConfigError, Error, SimulationConfig};

use crate::{
    project_path, run_scenario, validate_conservation, validate_faster_spreading,
    ConfinementCheck, ConservationCheck, ExpectedResult, ReferenceTest, SpreadingCheck, TestResult,
};

/// Coarser lattice used where the geometry allows it.
const COARSE_SPACING: f64 = 2.0e-5;

const CONSERVATION: ConservationCheck = ConservationCheck {
    max_mass_error: 1e-9,
    max_density_variation: 0.1,
};

/// Load a configuration from the workspace `configs/` directory
pub fn load_config(name: &str) -> Result<SimulationConfig, ConfigError> {
    SimulationConfig::load(project_path(&format!("configs/{name}")))
}

/// Scenario A: resting droplet on a flat substrate at 45 degrees.
///
/// The spreading diameter grows from about 2r and levels off by the end.
pub fn flat_resting_spreading() -> Result<ReferenceTest, ConfigError> {
    let mut config = load_config("flat.json")?;
    config.name = "flat-resting-45".to_string();
    config.particle_spacing = COARSE_SPACING;
    config.contact_angle = 45.0;
    config.carreau = None;
    config.droplet.falling = false;
    config.validate()?;

    let dx = config.particle_spacing;
    let r = config.droplet.radius;
    Ok(ReferenceTest {
        name: "Flat Substrate Spreading".to_string(),
        expected: ExpectedResult {
            spreading: Some(SpreadingCheck {
                initial_diameter: 2.0 * r,
                initial_tolerance: 2.0 * dx,
                min_growth: 0.05,
                max_retreat: 2.0 * dx,
                plateau_fraction: 0.2,
                plateau_tolerance: 0.03,
            }),
            confinement: None,
            conservation: Some(CONSERVATION),
        },
        config,
    })
}

/// Scenario B: droplet falling into a cavity with a 30 degree floor and
/// neutral walls.
///
/// All ink ends up below the ledges and above the floor, touching the floor
/// over no more than the cavity width.
pub fn cavity_filling() -> Result<ReferenceTest, ConfigError> {
    let mut config = load_config("cavity.json")?;
    config.name = "cavity-fill".to_string();
    let cavity = config.cavity.get_or_insert_with(Default::default);
    cavity.angles.bottom = 30.0;
    cavity.angles.left_wall = 90.0;
    cavity.angles.right_wall = 90.0;
    let dims = cavity.dims;
    config.droplet.falling = true;
    config.droplet.x_center = 0.5 * (dims.x_wall_left + dims.x_wall_right);
    // The droplet area fits the cavity so it can drain below the ledges.
    let cavity_area = (dims.x_wall_right - dims.x_wall_left) * -dims.y_bottom;
    config.droplet.radius = config
        .droplet
        .radius
        .min((0.8 * cavity_area / std::f64::consts::PI).sqrt());
    config.validate()?;

    Ok(ReferenceTest {
        name: "Cavity Filling".to_string(),
        expected: ExpectedResult {
            spreading: None,
            confinement: Some(ConfinementCheck {
                y_min: dims.y_bottom,
                y_max: 0.0,
                max_contact_width: dims.x_wall_right - dims.x_wall_left,
            }),
            conservation: Some(CONSERVATION),
        },
        config,
    })
}

/// Two runs that differ in one property, where `fast` must spread further.
pub struct ComparisonTest {
    /// Test name
    pub name: String,
    /// Run expected to spread less
    pub slow: SimulationConfig,
    /// Run expected to spread more
    pub fast: SimulationConfig,
    /// Minimum relative diameter advantage of `fast`
    pub min_margin: f64,
}

impl ComparisonTest {
    /// Run both configurations and compare their spreading
    pub fn run(&self) -> Result<TestResult, Error> {
        tracing::info!("Running comparison: {}", self.name);
        let slow = run_scenario(&format!("{}-slow", self.name), &self.slow)?;
        let fast = run_scenario(&format!("{}-fast", self.name), &self.fast)?;

        let checks = vec![
            validate_faster_spreading(&self.name, &slow.metrics, &fast.metrics, self.min_margin),
            validate_conservation(&slow.error_metrics, &CONSERVATION),
            validate_conservation(&fast.error_metrics, &CONSERVATION),
        ];
        let passed = checks.iter().all(|c| c.passed);
        Ok(TestResult {
            name: self.name.clone(),
            passed,
            checks,
            error_metrics: fast.error_metrics,
            timesteps: fast.timesteps,
            sim_time: fast.sim_time,
            metrics: fast.metrics,
        })
    }
}

/// Scenario C: Carreau shear thinning against the Newtonian fluid with the
/// same zero-shear viscosity.
pub fn carreau_versus_newtonian() -> Result<ComparisonTest, ConfigError> {
    let mut fast = load_config("carreau.json")?;
    fast.particle_spacing = COARSE_SPACING;
    let model = *fast.carreau.get_or_insert(CarreauModel {
        eta0: 0.5,
        eta_inf: 0.167,
        lambda: 0.15,
        n: 0.7,
    });
    fast.name = "carreau".to_string();

    let mut slow = fast.clone();
    slow.name = "newtonian".to_string();
    slow.carreau = None;
    slow.physics.nu = model.eta0 / slow.physics.rho0;

    fast.validate()?;
    slow.validate()?;
    Ok(ComparisonTest {
        name: "Carreau Versus Newtonian".to_string(),
        slow,
        fast,
        min_margin: 0.01,
    })
}

/// Contact-angle sign rule: a hydrophilic substrate spreads a resting
/// droplet further than a hydrophobic one.
pub fn contact_angle_sign_rule() -> Result<ComparisonTest, ConfigError> {
    let mut base = load_config("flat.json")?;
    base.particle_spacing = COARSE_SPACING;
    base.droplet.falling = false;
    base.carreau = None;
    base.end_time = base.end_time.min(5.0e-3);

    let mut fast = base.clone();
    fast.name = "hydrophilic-30".to_string();
    fast.contact_angle = 30.0;
    let mut slow = base;
    slow.name = "hydrophobic-120".to_string();
    slow.contact_angle = 120.0;

    fast.validate()?;
    slow.validate()?;
    Ok(ComparisonTest {
        name: "Contact Angle Sign Rule".to_string(),
        slow,
        fast,
        min_margin: 0.05,
    })
}
