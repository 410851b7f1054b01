//! Error types for tiling, analysis and rendering operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole crop, analyze or visualize operation.
///
/// Failures of individual tiles during analysis are not errors; they are
/// collected as [`crate::analysis::TileFailure`] values instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Failed to list tile directory '{path}': {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to save image '{path}': {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Malformed report '{path}' at line {line}: {source}")]
    Report {
        path: PathBuf,
        line: usize,
        #[source]
        source: crate::detection::ParseDetectionError,
    },

    #[error("Failed to read config '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Analysis cancelled")]
    Cancelled,
}

impl Error {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// True for bad arguments, including a tile directory that cannot be listed.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput { .. } | Error::ListDir { .. })
    }

    /// True for read/write failures on disk.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::ImageLoad { .. } | Error::ImageSave { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
