//! Starfield - tiled point-source detection.
//!
//! A large source image is cut into fixed-size tiles whose file names carry
//! their offset in the source frame. Tiles are analyzed concurrently on a
//! bounded worker pool, detections are translated back to the source frame,
//! duplicates along tile edges are merged, and the result is written as a text
//! report and drawn over the source image.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use starfield::{Config, Session};
//!
//! let mut session = Session::new(Config::default());
//! session.request_crop(Some("sky.png".as_ref()), Some("tiles".as_ref()))?;
//! let summary = session.request_analyze(None)?;
//! println!("{} objects in {} tiles", summary.detections, summary.tile_count);
//! session.request_visualize(None)?;
//! ```

pub mod analysis;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod image_io;
pub mod overlay;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod tile_name;
pub mod tiler;

#[cfg(test)]
mod testing;

// ============================================================================
// Data model
// ============================================================================

pub use detection::{Detection, LocalDetection, ParseDetectionError, TileOffset};
pub use error::{Error, Result};

// ============================================================================
// Tiling
// ============================================================================

pub use tiler::{TileSize, TileSpec, crop, crop_file, tile_grid};

// ============================================================================
// Analysis
// ============================================================================

pub use analysis::{
    AnalysisProgress, AnalysisResult, CancelToken, ProgressCallback, TileAnalyzer, TileFailure,
};
pub use detector::{DetectError, ObjectDetector, PeakDetector, PeakDetectorConfig};
pub use reconcile::{MergePolicy, reconcile};

// ============================================================================
// Output and session
// ============================================================================

pub use config::Config;
pub use overlay::render;
pub use session::{AnalyzeSummary, Session};
