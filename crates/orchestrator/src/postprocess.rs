//! Spreading metrics and plots derived from saved frames.
//!
//! Read-only: nothing here feeds back into a run.

use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::SnapshotError;
use crate::snapshot::{list_snapshots, load_snapshot, Snapshot};

/// Metrics file written next to the frames.
pub const METRICS_FILE: &str = "spreading_metrics.json";
/// Final-state scatter plot.
pub const FINAL_STATE_PLOT: &str = "final_state.png";
/// Metrics time-series plot.
pub const METRICS_PLOT: &str = "spreading_metrics.png";

const SOLID_COLOR: RGBColor = RGBColor(128, 128, 128);
const AIR_COLOR: RGBColor = RGBColor(173, 216, 230);
const INK_COLOR: RGBColor = RGBColor(0, 0, 139);

/// Ink-phase geometry of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// Step of the frame.
    pub step: u64,
    /// Simulated time (s).
    pub time: f64,
    /// Horizontal extent of the ink (m).
    pub spreading_diameter: f64,
    /// Highest ink particle (m).
    pub max_height: f64,
    /// Horizontal extent of the ink touching the lowest wall (m).
    pub contact_width: f64,
}

/// Metrics of one frame, or `None` when it holds no ink.
///
/// Contact width counts ink particles below `contact_level`, normally the
/// lowest wall surface plus two particle spacings; it is zero when none are.
pub fn frame_metrics(snapshot: &Snapshot, contact_level: f64) -> Option<FrameMetrics> {
    let fluid = &snapshot.fluid;
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    let mut cx_min = f64::INFINITY;
    let mut cx_max = f64::NEG_INFINITY;
    let mut any = false;

    for i in (0..fluid.len()).filter(|&i| fluid.is_ink(i)) {
        any = true;
        let (x, y) = (fluid.x[i], fluid.y[i]);
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_max = y_max.max(y);
        if y < contact_level {
            cx_min = cx_min.min(x);
            cx_max = cx_max.max(x);
        }
    }
    if !any {
        return None;
    }

    let contact_width = if cx_max >= cx_min { cx_max - cx_min } else { 0.0 };
    Some(FrameMetrics {
        step: snapshot.step,
        time: snapshot.time,
        spreading_diameter: x_max - x_min,
        max_height: y_max,
        contact_width,
    })
}

/// Metrics for every frame in `dir`, in step order. Frames are decoded in
/// parallel; frames without ink are skipped.
pub fn compute_metrics(dir: &Path, contact_level: f64) -> Result<Vec<FrameMetrics>, SnapshotError> {
    let frames = list_snapshots(dir)?;
    if frames.is_empty() {
        return Err(SnapshotError::Empty(dir.to_path_buf()));
    }
    let metrics: Vec<Option<FrameMetrics>> = frames
        .par_iter()
        .map(|path| load_snapshot(path).map(|snap| frame_metrics(&snap, contact_level)))
        .collect::<Result<_, _>>()?;
    let skipped = metrics.iter().filter(|m| m.is_none()).count();
    if skipped > 0 {
        tracing::warn!("{skipped} frames without ink skipped");
    }
    Ok(metrics.into_iter().flatten().collect())
}

/// Write the metrics time series as JSON.
pub fn write_metrics_json(path: &Path, metrics: &[FrameMetrics]) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(metrics).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a metrics file back.
pub fn read_metrics_json(path: &Path) -> Result<Vec<FrameMetrics>, SnapshotError> {
    let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Log the final metrics and return them.
pub fn summarise(metrics: &[FrameMetrics]) -> Option<FrameMetrics> {
    let last = metrics.last().copied()?;
    tracing::info!("=== Final spreading metrics ===");
    tracing::info!("Time: {:.4e} s (step {})", last.time, last.step);
    tracing::info!("Spreading diameter: {:.3} mm", last.spreading_diameter * 1e3);
    tracing::info!("Contact width: {:.3} mm", last.contact_width * 1e3);
    tracing::info!("Max height: {:.3} mm", last.max_height * 1e3);
    Some(last)
}

fn span<'a>(values: impl Iterator<Item = &'a f64>) -> [f64; 2] {
    values.fold([f64::INFINITY, f64::NEG_INFINITY], |[lo, hi], &v| [lo.min(v), hi.max(v)])
}

/// Bounding box of every particle in a frame, in metres.
fn particle_bounds(snapshot: &Snapshot) -> ([f64; 2], [f64; 2]) {
    (
        span(snapshot.fluid.x.iter().chain(&snapshot.solid.x)),
        span(snapshot.fluid.y.iter().chain(&snapshot.solid.y)),
    )
}

/// Image size giving equal x and y scales for the given extents, with the
/// wider side `long` pixels and room for the axis labels.
fn equal_aspect_size(x_span: f64, y_span: f64, long: u32) -> (u32, u32) {
    const LABELS: u32 = 80;
    let (x_span, y_span) = (x_span.max(f64::MIN_POSITIVE), y_span.max(f64::MIN_POSITIVE));
    let plot = f64::from(long - LABELS);
    let (w, h) = if x_span >= y_span {
        (plot, plot * y_span / x_span)
    } else {
        (plot * x_span / y_span, plot)
    };
    (w.round() as u32 + LABELS, (h.round() as u32).max(1) + LABELS)
}

/// Scatter plot of a frame: solid grey, air light blue, ink dark blue,
/// with equal axis scales in millimetres.
pub fn plot_final_state(snapshot: &Snapshot, path: &Path, title: &str) -> Result<(), SnapshotError> {
    draw_final_state(snapshot, path, title).map_err(|e| SnapshotError::Plot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn draw_final_state(snapshot: &Snapshot, path: &Path, title: &str) -> Result<(), Box<dyn StdError>> {
    let ([x0, x1], [y0, y1]) = particle_bounds(snapshot);
    let (x0, x1, y0, y1) = (x0 * 1e3, x1 * 1e3, y0 * 1e3, y1 * 1e3);
    let pad = 0.02 * (x1 - x0).max(y1 - y0);
    let size = equal_aspect_size(x1 - x0 + 2.0 * pad, y1 - y0 + 2.0 * pad, 1400);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d((x0 - pad)..(x1 + pad), (y0 - pad)..(y1 + pad))?;
    chart
        .configure_mesh()
        .x_desc("x [mm]")
        .y_desc("y [mm]")
        .draw()?;

    let solid = &snapshot.solid;
    chart
        .draw_series(
            (0..solid.len()).map(|k| Circle::new((solid.x[k] * 1e3, solid.y[k] * 1e3), 2, SOLID_COLOR.filled())),
        )?
        .label("Substrate")
        .legend(|(x, y)| Circle::new((x, y), 4, SOLID_COLOR.filled()));

    let fluid = &snapshot.fluid;
    let phase = |ink: bool| {
        (0..fluid.len())
            .filter(move |&i| fluid.is_ink(i) == ink)
            .map(move |i| (fluid.x[i] * 1e3, fluid.y[i] * 1e3))
    };
    chart
        .draw_series(phase(false).map(|p| Circle::new(p, 1, AIR_COLOR.mix(0.4).filled())))?
        .label("Air")
        .legend(|(x, y)| Circle::new((x, y), 4, AIR_COLOR.filled()));
    chart
        .draw_series(phase(true).map(|p| Circle::new(p, 2, INK_COLOR.filled())))?
        .label("Droplet")
        .legend(|(x, y)| Circle::new((x, y), 4, INK_COLOR.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Spreading diameter, contact width and height against time.
pub fn plot_metrics(metrics: &[FrameMetrics], path: &Path) -> Result<(), SnapshotError> {
    draw_metrics(metrics, path).map_err(|e| SnapshotError::Plot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn draw_metrics(metrics: &[FrameMetrics], path: &Path) -> Result<(), Box<dyn StdError>> {
    let t_max = metrics.iter().map(|m| m.time * 1e3).fold(0.0, f64::max).max(1e-9);
    let v_max = metrics
        .iter()
        .map(|m| m.spreading_diameter.max(m.max_height).max(m.contact_width) * 1e3)
        .fold(0.0, f64::max)
        * 1.1;
    let v_max = v_max.max(1e-9);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Droplet spreading", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..t_max, 0.0..v_max)?;
    chart
        .configure_mesh()
        .x_desc("t [ms]")
        .y_desc("length [mm]")
        .draw()?;

    let series: [(&str, RGBColor, fn(&FrameMetrics) -> f64); 3] = [
        ("Spreading diameter", BLUE, |m| m.spreading_diameter),
        ("Contact width", RED, |m| m.contact_width),
        ("Max height", GREEN, |m| m.max_height),
    ];
    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                metrics.iter().map(|m| (m.time * 1e3, value(m) * 1e3)),
                color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new([(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Files produced by [`post_process`].
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessOutput {
    /// Metrics of every frame with ink.
    pub metrics: Vec<FrameMetrics>,
    /// The metrics JSON file.
    pub metrics_file: PathBuf,
    /// Plots that rendered successfully.
    pub plots: Vec<PathBuf>,
}

/// Compute and write spreading metrics for the frames in `dir`, then render
/// the final-state and metrics plots.
///
/// A plot that fails to render is logged and skipped; the metrics file is
/// still written.
pub fn post_process(dir: &Path, config: &SimulationConfig) -> Result<PostProcessOutput, SnapshotError> {
    let contact_level = config.geometry().lowest_y() + 2.0 * config.particle_spacing;
    let metrics = compute_metrics(dir, contact_level)?;
    let metrics_file = dir.join(METRICS_FILE);
    write_metrics_json(&metrics_file, &metrics)?;
    tracing::info!("Metrics for {} frames saved to {}", metrics.len(), metrics_file.display());
    summarise(&metrics);

    let mut plots = Vec::new();
    let frames = list_snapshots(dir)?;
    if let Some(last) = frames.last() {
        let snapshot = load_snapshot(last)?;
        let title = match &config.cavity {
            Some(_) => format!("Droplet in cavity at t={:.2} ms", snapshot.time * 1e3),
            None => format!(
                "Droplet on substrate at t={:.2} ms (theta={} deg)",
                snapshot.time * 1e3,
                config.contact_angle
            ),
        };
        let path = dir.join(FINAL_STATE_PLOT);
        match plot_final_state(&snapshot, &path, &title) {
            Ok(()) => plots.push(path),
            Err(e) => tracing::warn!("{e}"),
        }
    }
    if !metrics.is_empty() {
        let path = dir.join(METRICS_PLOT);
        match plot_metrics(&metrics, &path) {
            Ok(()) => plots.push(path),
            Err(e) => tracing::warn!("{e}"),
        }
    }
    for plot in &plots {
        tracing::info!("Figure saved to {}", plot.display());
    }

    Ok(PostProcessOutput {
        metrics,
        metrics_file,
        plots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::save_snapshot;
    use kernel::particle::{AIR, INK};
    use kernel::{FluidParticles, SolidParticles};

    const DX: f64 = 1.0e-5;

    fn frame(step: u64, points: &[(f64, f64, f64)]) -> Snapshot {
        let mut fluid = FluidParticles::new();
        for &(x, y, color) in points {
            fluid.push_particle(x, y, 3.0e-7, 3000.0, 1.3e-5, 10.0, color, 5.0e-4);
        }
        let mut solid = SolidParticles::new();
        solid.push(0.0, -0.5 * DX, 3.0e-7, 3000.0, 0);
        Snapshot {
            step,
            time: step as f64 * 1.0e-6,
            fluid,
            solid,
        }
    }

    #[test]
    fn metrics_follow_ink_only() {
        let snap = frame(
            10,
            &[
                (1.0e-4, 0.5 * DX, INK),
                (3.0e-4, 1.5 * DX, INK),
                (2.0e-4, 8.0e-5, INK),
                (9.0e-4, 0.5 * DX, AIR),
                (5.0e-4, 9.0e-4, AIR),
            ],
        );
        let m = frame_metrics(&snap, 2.0 * DX).unwrap();
        assert!((m.spreading_diameter - 2.0e-4).abs() < 1e-15);
        assert!((m.max_height - 8.0e-5).abs() < 1e-15);
        assert!((m.contact_width - 2.0e-4).abs() < 1e-15);
        assert_eq!(m.step, 10);
    }

    #[test]
    fn lifted_droplet_has_zero_contact_width() {
        let snap = frame(0, &[(1.0e-4, 3.0e-4, INK), (1.2e-4, 3.1e-4, INK)]);
        let m = frame_metrics(&snap, 2.0 * DX).unwrap();
        assert_eq!(m.contact_width, 0.0);
        assert!((m.spreading_diameter - 2.0e-5).abs() < 1e-15);
    }

    #[test]
    fn frame_without_ink_is_skipped() {
        let snap = frame(0, &[(1.0e-4, 3.0e-4, AIR)]);
        assert!(frame_metrics(&snap, 2.0 * DX).is_none());
    }

    #[test]
    fn contact_level_follows_cavity_floor() {
        let snap = frame(0, &[(5.0e-4, -0.125e-3, INK), (6.0e-4, -0.125e-3, INK), (7.0e-4, 0.5 * DX, INK)]);
        let floor = -0.13e-3 + 2.0 * DX;
        let m = frame_metrics(&snap, floor).unwrap();
        assert!((m.contact_width - 1.0e-4).abs() < 1e-15);
    }

    #[test]
    fn metrics_series_is_ordered_and_persisted() {
        let dir = std::env::temp_dir().join(format!("droplet-post-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        save_snapshot(&dir, &frame(200, &[(1.0e-4, 0.5 * DX, INK), (4.0e-4, 0.5 * DX, INK)])).unwrap();
        save_snapshot(&dir, &frame(0, &[(2.0e-4, 0.5 * DX, INK), (3.0e-4, 0.5 * DX, INK)])).unwrap();
        save_snapshot(&dir, &frame(100, &[(2.0e-4, 0.5 * DX, AIR)])).unwrap();

        let metrics = compute_metrics(&dir, 2.0 * DX).unwrap();
        let steps: Vec<u64> = metrics.iter().map(|m| m.step).collect();
        assert_eq!(steps, vec![0, 200]);
        assert!(metrics[1].spreading_diameter > metrics[0].spreading_diameter);

        let path = dir.join(METRICS_FILE);
        write_metrics_json(&path, &metrics).unwrap();
        assert_eq!(read_metrics_json(&path).unwrap(), metrics);
        assert_eq!(summarise(&metrics), Some(metrics[1]));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("droplet-post-empty-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        assert!(matches!(compute_metrics(&dir, 0.0), Err(SnapshotError::Empty(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn equal_aspect_keeps_scale() {
        let (w, h) = equal_aspect_size(1.6, 0.8, 1080);
        assert_eq!((w, h), (1080, 580));
        let (w, h) = equal_aspect_size(0.5, 1.0, 1080);
        assert_eq!((w, h), (580, 1080));
    }
}
