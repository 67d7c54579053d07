//! End-to-end pipeline test
//!
//! Configuration -> particles -> fixed-step run -> frames -> metrics, on a
//! small cavity so it runs in well under a second.

use std::fs;

use kernel::{CavityAngles, CavityDims, SimulationKernel};
use orchestrator::config::{CavityConfig, DomainConfig, OutputConfig};
use orchestrator::postprocess::{self, read_metrics_json, METRICS_FILE};
use orchestrator::snapshot::{frame_step, list_snapshots, load_snapshot};
use orchestrator::{create_simulation, load_run_config, RunnerState, SimulationConfig};

fn small_cavity(tag: &str) -> SimulationConfig {
    let mut config = SimulationConfig {
        name: format!("pipeline-{tag}"),
        domain: DomainConfig {
            width: 2.0e-4,
            height: 1.0e-4,
        },
        cavity: Some(CavityConfig {
            dims: CavityDims {
                x_wall_left: 0.5e-4,
                x_wall_right: 1.5e-4,
                y_bottom: -0.5e-4,
            },
            angles: CavityAngles::default(),
        }),
        end_time: 1.0,
        max_timesteps: Some(4),
        output: OutputConfig {
            directory: std::env::temp_dir()
                .join(format!("droplet-pipeline-{tag}-{}", std::process::id())),
            interval: 2,
        },
        ..SimulationConfig::default()
    };
    config.droplet.radius = 3.0e-5;
    config.droplet.x_center = 1.0e-4;
    config.droplet.falling = false;
    let _ = fs::remove_dir_all(&config.output.directory);
    config
}

#[test]
fn cavity_run_produces_frames_and_metrics() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let config = small_cavity("metrics");
    let dir = config.output.directory.clone();

    let mut runner = create_simulation(&config).unwrap();
    let ink = runner.kernel().fluid().ink_count();
    let summary = runner.run().unwrap();
    assert_eq!(summary.state, RunnerState::Finished);
    assert_eq!(summary.steps, 4);
    assert!(!summary.stopped);

    let frames = list_snapshots(&dir).unwrap();
    let steps: Vec<u64> = frames.iter().filter_map(|p| frame_step(p)).collect();
    assert_eq!(steps, vec![0, 2, 4]);

    let last = load_snapshot(frames.last().unwrap()).unwrap();
    assert_eq!(last.step, 4);
    assert_eq!(last.fluid.ink_count(), ink);
    assert!(last.fluid.x.iter().chain(&last.fluid.y).all(|v| v.is_finite()));

    let saved = load_run_config(&dir).unwrap();
    let output = postprocess::post_process(&dir, &saved).unwrap();
    assert_eq!(output.metrics.len(), 3);
    assert_eq!(output.metrics_file, dir.join(METRICS_FILE));
    assert_eq!(read_metrics_json(&output.metrics_file).unwrap(), output.metrics);

    // Nothing has moved far in four steps: the droplet still spans about 2r.
    let first = output.metrics[0];
    assert!((first.spreading_diameter - 2.0 * config.droplet.radius).abs() < 2.0 * config.particle_spacing);
    assert!(first.max_height > 0.0 && first.max_height < 2.0 * config.droplet.radius);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn stop_request_before_run_keeps_initial_frame() {
    let config = small_cavity("stop");
    let dir = config.output.directory.clone();

    let mut runner = create_simulation(&config).unwrap();
    runner.stop_handle().store(true, std::sync::atomic::Ordering::SeqCst);
    let summary = runner.run().unwrap();
    assert!(summary.stopped);
    assert_eq!(summary.steps, 0);
    assert_eq!(list_snapshots(&dir).unwrap().len(), 1);

    fs::remove_dir_all(&dir).ok();
}
