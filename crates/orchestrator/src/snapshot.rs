//! Snapshot frames: full particle state at a given step, one JSON file each.
//!
//! Frames are named `frame_<step>.json` with the step zero-padded to eight
//! digits, so lexical and numeric order agree. Every frame is written to a
//! hidden temporary file first and renamed into place, so a reader never
//! sees a partially written frame.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use kernel::{FluidParticles, SolidParticles};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Frames the background writer may hold before `submit` blocks.
const WRITER_QUEUE_DEPTH: usize = 4;

/// Full particle state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Completed steps.
    pub step: u64,
    /// Simulated time (s).
    pub time: f64,
    /// Fluid state, including interface and rheology fields.
    pub fluid: FluidParticles,
    /// Wall particles with their extrapolated pressure.
    pub solid: SolidParticles,
}

/// Path of the frame for `step` inside `dir`.
pub fn frame_path(dir: &Path, step: u64) -> PathBuf {
    dir.join(format!("frame_{step:08}.json"))
}

/// Step encoded in a frame file name, if `path` names a frame.
pub fn frame_step(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("frame_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `snapshot` into `dir` atomically and return the frame path.
pub fn save_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
    let path = frame_path(dir, snapshot.step);
    let tmp = dir.join(format!(".frame_{:08}.json.tmp", snapshot.step));

    let file = File::create(&tmp).map_err(io_error(&tmp))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot).map_err(|source| SnapshotError::Json {
        path: tmp.clone(),
        source,
    })?;
    writer.flush().map_err(io_error(&tmp))?;
    drop(writer);

    fs::rename(&tmp, &path).map_err(io_error(&path))?;
    Ok(path)
}

/// Read one frame.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let file = File::open(path).map_err(io_error(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// All frames in `dir`, ordered by step. Temporary files are ignored.
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut frames: Vec<(u64, PathBuf)> = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| frame_step(&path).map(|step| (step, path)))
        .collect();
    frames.sort_by_key(|(step, _)| *step);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Writes frames on a background thread so the stepping loop does not wait
/// on the filesystem.
///
/// The first write error stops further writes; it is reported by
/// [`finish`](Self::finish).
pub struct SnapshotWriter {
    sender: Option<SyncSender<Snapshot>>,
    handle: Option<JoinHandle<Result<Vec<PathBuf>, SnapshotError>>>,
}

impl SnapshotWriter {
    /// Create `dir` if needed and start the writer thread.
    pub fn spawn(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        let (sender, receiver) = mpsc::sync_channel(WRITER_QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name("snapshot-writer".to_string())
            .spawn(move || write_loop(&dir, receiver))
            .map_err(|source| SnapshotError::Io {
                path: PathBuf::from("snapshot-writer"),
                source,
            })?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue a frame for writing.
    pub fn submit(&self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        self.sender
            .as_ref()
            .ok_or(SnapshotError::WriterGone)?
            .send(snapshot)
            .map_err(|_| SnapshotError::WriterGone)
    }

    /// Flush every queued frame and stop the thread. Returns the written
    /// frame paths in submission order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>, SnapshotError> {
        self.sender.take();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SnapshotError::WriterGone)?,
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if let Ok(Err(e)) = handle.join() {
                tracing::warn!("snapshot writer stopped with error: {e}");
            }
        }
    }
}

fn write_loop(dir: &Path, receiver: Receiver<Snapshot>) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut written = Vec::new();
    let mut failure = None;
    for snapshot in receiver {
        // Keep draining after a failure so senders never block forever.
        if failure.is_some() {
            continue;
        }
        match save_snapshot(dir, &snapshot) {
            Ok(path) => {
                tracing::debug!(step = snapshot.step, path = %path.display(), "frame written");
                written.push(path);
            }
            Err(e) => {
                tracing::error!(step = snapshot.step, "failed to write frame: {e}");
                failure = Some(e);
            }
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
