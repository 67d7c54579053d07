//! Error types for configuration, snapshot I/O and runs.

use std::io;
use std::path::PathBuf;

use kernel::{CarreauError, GeometryError, KernelError};
use thiserror::Error;

/// Problems found while loading or validating a [`SimulationConfig`](crate::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A parameter is out of range or contradicts another one.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Dotted parameter name, e.g. `carreau.eta_inf`.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The wall geometry does not fit the domain or the particle lattice.
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
    /// The Carreau rheology parameters are out of range.
    #[error("carreau: {0}")]
    Carreau(#[from] CarreauError),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Problems reading or writing snapshot frames and derived output.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure.
    #[error("{path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A frame could not be encoded or decoded.
    #[error("{path}: {source}")]
    Json {
        /// Frame file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The output directory holds no frames.
    #[error("no snapshot frames found in {0}")]
    Empty(PathBuf),
    /// Plot rendering failed.
    #[error("failed to render {path}: {reason}")]
    Plot {
        /// Image being written.
        path: PathBuf,
        /// Backend message.
        reason: String,
    },
    /// The background writer thread went away before all frames were flushed.
    #[error("snapshot writer thread terminated unexpectedly")]
    WriterGone,
}

/// Any failure of a full run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or geometry rejected before stepping.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Snapshot or plot output failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// The simulation diverged.
    #[error("{source}; last good frame: {}", last_good_frame.as_ref().map_or_else(|| "none".to_string(), |p| p.display().to_string()))]
    Diverged {
        /// Kernel failure.
        #[source]
        source: KernelError,
        /// Last snapshot written before the failure, if any.
        last_good_frame: Option<PathBuf>,
    },
}

impl From<GeometryError> for Error {
    fn from(err: GeometryError) -> Self {
        Self::Config(ConfigError::Geometry(err))
    }
}

impl From<KernelError> for Error {
    fn from(source: KernelError) -> Self {
        Self::Diverged {
            source,
            last_good_frame: None,
        }
    }
}
