//! Reference test framework for droplet spreading validation
//!
//! Each reference test runs a full simulation through the orchestrator
//! pipeline, computes spreading metrics from the saved frames and checks
//! them against expected physical behaviour.


pub mod scenarios;

use std::path::{Path, PathBuf};

use kernel::{ErrorMetrics, FluidParticles, SimulationKernel};
use orchestrator::postprocess::{self, FrameMetrics};
use orchestrator::{create_simulation, Error, SimulationConfig};

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Spreading diameter growth and plateau
    pub spreading: Option<SpreadingCheck>,
    /// Final ink position and contact width bounds
    pub confinement: Option<ConfinementCheck>,
    /// Conservation metrics validation
    pub conservation: Option<ConservationCheck>,
}

/// Check that the spreading diameter grows from its initial value and then
/// levels off
#[derive(Debug, Clone)]
pub struct SpreadingCheck {
    /// Expected diameter of the first frame (m)
    pub initial_diameter: f64,
    /// Allowed absolute deviation of the first frame (m)
    pub initial_tolerance: f64,
    /// Minimum relative growth between the first and last frame
    pub min_growth: f64,
    /// Largest allowed drop below the running maximum (m)
    pub max_retreat: f64,
    /// Fraction of the frames, counted from the end, treated as the plateau
    pub plateau_fraction: f64,
    /// Maximum relative change of the diameter across the plateau
    pub plateau_tolerance: f64,
}

/// Check where the ink ends up
#[derive(Debug, Clone)]
pub struct ConfinementCheck {
    /// Lowest allowed ink position (m)
    pub y_min: f64,
    /// Every ink particle must sit strictly below this height (m)
    pub y_max: f64,
    /// Largest allowed contact width (m)
    pub max_contact_width: f64,
}

/// Check conservation metrics
#[derive(Debug, Clone)]
pub struct ConservationCheck {
    /// Maximum allowed mass conservation error (0.0 to 1.0)
    pub max_mass_error: f64,
    /// Maximum allowed relative density deviation (0.0 to 1.0)
    pub max_density_variation: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Final error metrics
    pub error_metrics: ErrorMetrics,
    /// Number of timesteps executed
    pub timesteps: u64,
    /// Simulated time (seconds)
    pub sim_time: f64,
    /// Spreading metrics of every saved frame
    pub metrics: Vec<FrameMetrics>,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Error message if failed
    pub message: Option<String>,
}

/// Outcome of one simulation run, before any check is applied
#[derive(Debug)]
pub struct ScenarioRun {
    /// Final fluid state
    pub fluid: FluidParticles,
    /// Final error metrics
    pub error_metrics: ErrorMetrics,
    /// Steps executed
    pub timesteps: u64,
    /// Simulated time (seconds)
    pub sim_time: f64,
    /// Spreading metrics of every saved frame
    pub metrics: Vec<FrameMetrics>,
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Configuration to run; its output directory is replaced by a scratch
    /// directory named after the test
    pub config: SimulationConfig,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

/// Resolve a path relative to the workspace root
pub fn project_path(relative: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .join(relative)
}

/// Scratch output directory for a named run
pub fn scratch_dir(name: &str) -> PathBuf {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    std::env::temp_dir().join(format!("droplet-reference-{slug}"))
}

/// Run `config` to completion into a scratch directory and collect metrics
pub fn run_scenario(name: &str, config: &SimulationConfig) -> Result<ScenarioRun, Error> {
    let mut config = config.clone();
    config.output.directory = scratch_dir(name);
    if config.output.directory.exists() {
        std::fs::remove_dir_all(&config.output.directory).map_err(|source| {
            orchestrator::SnapshotError::Io {
                path: config.output.directory.clone(),
                source,
            }
        })?;
    }

    let mut runner = create_simulation(&config)?;
    let summary = runner.run()?;
    tracing::info!(
        "Simulation complete: {} steps, {:.6}s simulated, {} frames",
        summary.steps,
        summary.time,
        summary.frames.len()
    );

    let contact_level = config.geometry().lowest_y() + 2.0 * config.particle_spacing;
    let metrics = postprocess::compute_metrics(&config.output.directory, contact_level)?;

    let kernel = runner.kernel();
    Ok(ScenarioRun {
        fluid: kernel.fluid().clone(),
        error_metrics: kernel.error_metrics(),
        timesteps: summary.steps,
        sim_time: summary.time,
        metrics,
    })
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, Error> {
        tracing::info!("Running reference test: {}", self.name);
        let run = run_scenario(&self.name, &self.config)?;

        let mut checks = Vec::new();
        if let Some(ref spreading) = self.expected.spreading {
            checks.push(validate_spreading(&run.metrics, spreading));
        }
        if let Some(ref confinement) = self.expected.confinement {
            checks.push(validate_confinement(&run, confinement));
        }
        if let Some(ref conservation) = self.expected.conservation {
            checks.push(validate_conservation(&run.error_metrics, conservation));
        }
        let passed = checks.iter().all(|c| c.passed);

        Ok(TestResult {
            name: self.name.clone(),
            passed,
            checks,
            error_metrics: run.error_metrics,
            timesteps: run.timesteps,
            sim_time: run.sim_time,
            metrics: run.metrics,
        })
    }
}

/// Validate growth from the initial diameter followed by a plateau
pub fn validate_spreading(metrics: &[FrameMetrics], check: &SpreadingCheck) -> CheckResult {
    let name = "Spreading".to_string();
    let (Some(first), Some(last)) = (metrics.first(), metrics.last()) else {
        return CheckResult {
            name,
            passed: false,
            message: Some("No frames with ink".to_string()),
        };
    };

    let mut issues = Vec::new();
    let d0 = first.spreading_diameter;
    if (d0 - check.initial_diameter).abs() > check.initial_tolerance {
        issues.push(format!(
            "initial diameter {:.4} mm, expected {:.4} mm",
            d0 * 1e3,
            check.initial_diameter * 1e3
        ));
    }

    let growth = last.spreading_diameter / d0 - 1.0;
    if growth < check.min_growth {
        issues.push(format!(
            "growth {:.1}% (minimum {:.1}%)",
            growth * 100.0,
            check.min_growth * 100.0
        ));
    }

    let mut running_max = d0;
    let mut worst_retreat = 0.0_f64;
    for m in metrics {
        running_max = running_max.max(m.spreading_diameter);
        worst_retreat = worst_retreat.max(running_max - m.spreading_diameter);
    }
    if worst_retreat > check.max_retreat {
        issues.push(format!("diameter retreated by {:.4} mm", worst_retreat * 1e3));
    }

    let tail = ((metrics.len() as f64 * check.plateau_fraction).ceil() as usize).clamp(2, metrics.len().max(2));
    let plateau = &metrics[metrics.len().saturating_sub(tail)..];
    let (lo, hi) = plateau.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
        (lo.min(m.spreading_diameter), hi.max(m.spreading_diameter))
    });
    let plateau_change = (hi - lo) / last.spreading_diameter;
    if plateau_change > check.plateau_tolerance {
        issues.push(format!(
            "diameter still changing by {:.1}% over the last {} frames",
            plateau_change * 100.0,
            plateau.len()
        ));
    }

    if issues.is_empty() {
        CheckResult {
            name,
            passed: true,
            message: Some(format!(
                "Diameter {:.4} mm -> {:.4} mm ({:+.1}%), plateau variation {:.1}%",
                d0 * 1e3,
                last.spreading_diameter * 1e3,
                growth * 100.0,
                plateau_change * 100.0
            )),
        }
    } else {
        CheckResult {
            name,
            passed: false,
            message: Some(issues.join(", ")),
        }
    }
}

/// Validate that the ink settled inside the expected band
pub fn validate_confinement(run: &ScenarioRun, check: &ConfinementCheck) -> CheckResult {
    let fluid = &run.fluid;
    let mut below = 0;
    let mut above = 0;
    let mut y_lo = f64::INFINITY;
    let mut y_hi = f64::NEG_INFINITY;
    for i in (0..fluid.len()).filter(|&i| fluid.is_ink(i)) {
        let y = fluid.y[i];
        y_lo = y_lo.min(y);
        y_hi = y_hi.max(y);
        if y < check.y_min {
            below += 1;
        }
        if y >= check.y_max {
            above += 1;
        }
    }
    let contact_width = run.metrics.last().map_or(0.0, |m| m.contact_width);

    let mut issues = Vec::new();
    if fluid.ink_count() == 0 {
        issues.push("no ink particles".to_string());
    }
    if below > 0 {
        issues.push(format!("{below} ink particles below {:.4} mm", check.y_min * 1e3));
    }
    if above > 0 {
        issues.push(format!("{above} ink particles at or above {:.4} mm", check.y_max * 1e3));
    }
    if contact_width > check.max_contact_width {
        issues.push(format!(
            "contact width {:.4} mm exceeds {:.4} mm",
            contact_width * 1e3,
            check.max_contact_width * 1e3
        ));
    }

    if issues.is_empty() {
        CheckResult {
            name: "Confinement".to_string(),
            passed: true,
            message: Some(format!(
                "Ink between y={:.4} mm and y={:.4} mm, contact width {:.4} mm",
                y_lo * 1e3,
                y_hi * 1e3,
                contact_width * 1e3
            )),
        }
    } else {
        CheckResult {
            name: "Confinement".to_string(),
            passed: false,
            message: Some(issues.join(", ")),
        }
    }
}

/// Validate conservation metrics
pub fn validate_conservation(metrics: &ErrorMetrics, check: &ConservationCheck) -> CheckResult {
    let mass_ok = metrics.mass_conservation <= check.max_mass_error;
    let density_ok = metrics.max_density_variation <= check.max_density_variation;

    if mass_ok && density_ok {
        CheckResult {
            name: "Conservation".to_string(),
            passed: true,
            message: Some(format!(
                "Mass: {:.3}%, Density variation: {:.2}%",
                metrics.mass_conservation * 100.0,
                metrics.max_density_variation * 100.0
            )),
        }
    } else {
        let mut issues = Vec::new();
        if !mass_ok {
            issues.push(format!(
                "Mass: {:.3}% (limit: {:.3}%)",
                metrics.mass_conservation * 100.0,
                check.max_mass_error * 100.0
            ));
        }
        if !density_ok {
            issues.push(format!(
                "Density variation: {:.2}% (limit: {:.2}%)",
                metrics.max_density_variation * 100.0,
                check.max_density_variation * 100.0
            ));
        }
        CheckResult {
            name: "Conservation".to_string(),
            passed: false,
            message: Some(issues.join(", ")),
        }
    }
}

/// Check that `fast` spread further than `slow` at the last frame both runs
/// share, by at least `min_margin` relative to `slow`.
pub fn validate_faster_spreading(
    name: &str,
    slow: &[FrameMetrics],
    fast: &[FrameMetrics],
    min_margin: f64,
) -> CheckResult {
    let common = slow
        .iter()
        .rev()
        .find_map(|s| fast.iter().find(|f| f.step == s.step).map(|f| (s, f)));
    let Some((s, f)) = common else {
        return CheckResult {
            name: name.to_string(),
            passed: false,
            message: Some("No common frame between the runs".to_string()),
        };
    };

    let margin = f.spreading_diameter / s.spreading_diameter - 1.0;
    CheckResult {
        name: name.to_string(),
        passed: margin >= min_margin,
        message: Some(format!(
            "At t={:.3} ms: {:.4} mm vs {:.4} mm ({:+.1}%, required {:+.1}%)",
            s.time * 1e3,
            f.spreading_diameter * 1e3,
            s.spreading_diameter * 1e3,
            margin * 100.0,
            min_margin * 100.0
        )),
    }
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Timesteps: {}", self.timesteps);
        println!("Simulated time: {:.6} s", self.sim_time);
        println!("Frames analysed: {}", self.metrics.len());
        println!("\nError Metrics:");
        println!("  Max density variation: {:.2}%", self.error_metrics.max_density_variation * 100.0);
        println!("  Mass conservation: {:.3}%", self.error_metrics.mass_conservation * 100.0);
        println!("\nValidation Checks:");
        print_checks(&self.checks);
        println!("{}", "=".repeat(80));
    }
}

/// Print one line per check
pub fn print_checks(checks: &[CheckResult]) {
    for check in checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        print!("  [{}] {}", status, check.name);
        if let Some(ref msg) = check.message {
            print!(" - {}", msg);
        }
        println!();
    }
}
