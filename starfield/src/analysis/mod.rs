//! Concurrent analysis of a directory of tiles.
//!
//! Every file whose name decodes to a tile offset becomes one unit of work:
//! load the tile, run the detector, translate detections into the source
//! frame. Units run on a bounded worker pool and are merged only after all of
//! them have finished. A unit that fails is recorded and dropped from the
//! result without affecting the others.


use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use crate::detection::{Detection, TileOffset};
use crate::detector::ObjectDetector;
use crate::error::{Error, Result};
use crate::image_io::load_image;
use crate::tile_name;

/// Progress of an analysis run, reported after each tile finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisProgress {
    pub completed: usize,
    pub total: usize,
}

/// Callback type for progress reporting. Called from worker threads.
pub type ProgressCallback = Arc<dyn Fn(AnalysisProgress) + Send + Sync>;

/// Shared flag that stops an analysis run.
///
/// Once set, no new tile is started and [`TileAnalyzer::analyze`] returns
/// [`Error::Cancelled`] without publishing any partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A tile that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFailure {
    pub path: PathBuf,
    pub offset: TileOffset,
    pub reason: String,
}

impl fmt::Display for TileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tile '{}' at ({}, {}): {}",
            self.path.display(),
            self.offset.x,
            self.offset.y,
            self.reason
        )
    }
}

/// Merged outcome of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    /// Detections from every successful tile, in the source image frame.
    /// Order is unspecified.
    pub detections: Vec<Detection>,
    /// Tiles whose load or detection failed.
    pub failures: Vec<TileFailure>,
    /// Number of decodable tile files found.
    pub tile_count: usize,
    /// Directory entries ignored because their names are not tile names.
    pub skipped_entries: usize,
}

impl AnalysisResult {
    pub fn succeeded_tiles(&self) -> usize {
        self.tile_count - self.failures.len()
    }
}

#[derive(Debug, Clone)]
struct TileEntry {
    path: PathBuf,
    offset: TileOffset,
}

/// Runs an [`ObjectDetector`] over every tile in a directory.
pub struct TileAnalyzer<D> {
    detector: D,
    max_workers: usize,
    cancel: Option<CancelToken>,
    progress: Option<ProgressCallback>,
}

impl<D: ObjectDetector> TileAnalyzer<D> {
    /// Analyzer with one worker per logical CPU.
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            max_workers: 0,
            cancel: None,
            progress: None,
        }
    }

    /// Caps the number of tiles processed concurrently. `0` means one per logical CPU.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Analyzes every tile in `tile_dir` with the given detection radius.
    ///
    /// Fails only if the radius is invalid, the directory cannot be listed, the
    /// worker pool cannot start, or the run is cancelled.
    pub fn analyze(&self, tile_dir: &Path, radius: f32) -> Result<AnalysisResult> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::invalid_input(format!(
                "detection radius must be positive, got {radius}"
            )));
        }

        let files = common::file_utils::list_files(tile_dir).map_err(|source| Error::ListDir {
            path: tile_dir.to_path_buf(),
            source,
        })?;

        let total_files = files.len();
        let tiles: Vec<TileEntry> = files
            .into_iter()
            .filter_map(|path| {
                let offset = tile_name::decode_path(&path);
                if offset.is_none() {
                    tracing::debug!(path = %path.display(), "Skipping non-tile entry");
                }
                offset.map(|offset| TileEntry { path, offset })
            })
            .collect();
        let skipped_entries = total_files - tiles.len();

        if tiles.is_empty() {
            tracing::info!(
                tile_dir = %tile_dir.display(),
                skipped_entries,
                "No tiles to analyze"
            );
            return Ok(AnalysisResult {
                skipped_entries,
                ..Default::default()
            });
        }

        let workers = common::parallel::resolve_workers(self.max_workers).min(tiles.len());
        let pool = common::parallel::bounded_pool(workers, "tile-worker")?;

        tracing::info!(
            tile_dir = %tile_dir.display(),
            tile_count = tiles.len(),
            skipped_entries,
            workers,
            radius,
            "Analyzing tiles"
        );

        let start = Instant::now();
        let total = tiles.len();
        let completed = AtomicUsize::new(0);

        let outcomes = common::parallel::par_map_on(&pool, &tiles, |tile| {
            if self.is_cancelled() {
                return None;
            }
            let outcome = self.analyze_tile(tile, radius);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = self.progress.as_ref() {
                progress(AnalysisProgress {
                    completed: done,
                    total,
                });
            }
            Some(outcome)
        });

        if self.is_cancelled() {
            tracing::info!(
                completed = completed.load(Ordering::SeqCst),
                total,
                "Analysis cancelled, discarding results"
            );
            return Err(Error::Cancelled);
        }

        let mut result = AnalysisResult {
            tile_count: total,
            skipped_entries,
            ..Default::default()
        };
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(detections) => result.detections.extend(detections),
                Err(failure) => {
                    tracing::warn!(
                        path = %failure.path.display(),
                        offset_x = failure.offset.x,
                        offset_y = failure.offset.y,
                        reason = %failure.reason,
                        "Tile analysis failed"
                    );
                    result.failures.push(failure);
                }
            }
        }

        tracing::info!(
            detections = result.detections.len(),
            failed_tiles = result.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis finished"
        );
        Ok(result)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn analyze_tile(
        &self,
        tile: &TileEntry,
        radius: f32,
    ) -> std::result::Result<Vec<Detection>, TileFailure> {
        let fail = |reason: String| TileFailure {
            path: tile.path.clone(),
            offset: tile.offset,
            reason,
        };

        let image = load_image(&tile.path).map_err(|e| fail(e.to_string()))?;

        let local = panic::catch_unwind(AssertUnwindSafe(|| self.detector.detect(&image, radius)))
            .map_err(|payload| {
                fail(format!(
                    "detector panicked: {}",
                    panic_message(payload.as_ref())
                ))
            })?
            .map_err(|e| fail(e.to_string()))?;

        tracing::trace!(
            offset_x = tile.offset.x,
            offset_y = tile.offset.y,
            detections = local.len(),
            "Tile analyzed"
        );
        Ok(local.iter().map(|d| d.to_global(tile.offset)).collect())
    }
}

/// Convenience wrapper: analyze `tile_dir` with default worker count.
pub fn analyze<D: ObjectDetector>(
    tile_dir: &Path,
    radius: f32,
    detector: D,
) -> Result<AnalysisResult> {
    TileAnalyzer::new(detector).analyze(tile_dir, radius)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
