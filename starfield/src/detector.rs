//! Per-tile object detection.
//!
//! The pipeline only depends on [`ObjectDetector`]. [`PeakDetector`] is the
//! built-in implementation: a thresholded local-maximum finder tuned for
//! point sources on a dark sky background.
//!
//! # Algorithm
//!
//! 1. **Background**: median of the tile luminance; noise is `1.4826 * MAD`.
//! 2. **Threshold**: a pixel is a candidate when it exceeds
//!    `background + max(threshold_sigma * noise, min_peak)`.
//! 3. **Suppression**: a candidate survives only if no pixel within `radius`
//!    is brighter. Equal pixels resolve to the first in row-major order.
//! 4. **Centroid**: background-subtracted intensity-weighted mean over the
//!    3x3 window around the peak.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::LocalDetection;

/// MAD to Gaussian sigma conversion factor.
const MAD_TO_SIGMA: f32 = 1.4826;

/// Half-width of the centroid window.
const CENTROID_HALF_WIDTH: i64 = 1;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Tile has no pixels")]
    EmptyTile,

    #[error("Detection radius must be positive and finite, got {0}")]
    InvalidRadius(f32),

    #[error("Detector failed: {0}")]
    Other(String),
}

/// Finds point-like objects in a single tile.
///
/// Positions are returned in the tile's own pixel frame, with pixel centers at
/// integer coordinates. Implementations are shared across worker threads.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, tile: &DynamicImage, radius: f32) -> Result<Vec<LocalDetection>, DetectError>;
}

impl<F> ObjectDetector for F
where
    F: Fn(&DynamicImage, f32) -> Result<Vec<LocalDetection>, DetectError> + Send + Sync,
{
    fn detect(&self, tile: &DynamicImage, radius: f32) -> Result<Vec<LocalDetection>, DetectError> {
        self(tile, radius)
    }
}

/// Configuration for [`PeakDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDetectorConfig {
    /// Detection threshold in units of background noise.
    pub threshold_sigma: f32,
    /// Minimum peak height above background, in normalized `[0, 1]` luminance.
    /// Keeps noise-free flat tiles from producing detections.
    pub min_peak: f32,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: 5.0,
            min_peak: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    config: PeakDetectorConfig,
}

impl PeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: PeakDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakDetectorConfig {
        &self.config
    }
}

impl ObjectDetector for PeakDetector {
    fn detect(&self, tile: &DynamicImage, radius: f32) -> Result<Vec<LocalDetection>, DetectError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(DetectError::InvalidRadius(radius));
        }
        let luma = tile.to_luma32f();
        let (width, height) = (luma.width() as usize, luma.height() as usize);
        if width == 0 || height == 0 {
            return Err(DetectError::EmptyTile);
        }
        let pixels = luma.as_raw();

        let (background, noise) = background_and_noise(pixels);
        let threshold =
            background + (self.config.threshold_sigma * noise).max(self.config.min_peak);

        // A window wider than the tile covers the whole tile.
        let r = (radius.ceil() as i64).min(width.max(height) as i64);
        let radius_sq = (radius as f64) * (radius as f64);

        let mut found = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let value = pixels[y * width + x];
                if value <= threshold {
                    continue;
                }
                if !is_neighbourhood_peak(pixels, width, height, x, y, r, radius_sq) {
                    continue;
                }
                found.push(centroid(pixels, width, height, x, y, background));
            }
        }

        tracing::trace!(
            width,
            height,
            background,
            noise,
            detections = found.len(),
            "Tile detection finished"
        );
        Ok(found)
    }
}

/// Median and MAD-derived sigma of `pixels`.
fn background_and_noise(pixels: &[f32]) -> (f32, f32) {
    let mut values = pixels.to_vec();
    let median = median_mut(&mut values);
    for v in values.iter_mut() {
        *v = (*v - median).abs();
    }
    let mad = median_mut(&mut values);
    (median, mad * MAD_TO_SIGMA)
}

fn median_mut(values: &mut [f32]) -> f32 {
    debug_assert!(!values.is_empty());
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}

/// True if `(x, y)` is the brightest pixel within `radius`, with ties going to
/// the earliest pixel in row-major order.
fn is_neighbourhood_peak(
    pixels: &[f32],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    r: i64,
    radius_sq: f64,
) -> bool {
    let value = pixels[y * width + x];
    let (xi, yi) = (x as i64, y as i64);
    let y0 = (yi - r).max(0);
    let y1 = (yi + r).min(height as i64 - 1);
    let x0 = (xi - r).max(0);
    let x1 = (xi + r).min(width as i64 - 1);

    for ny in y0..=y1 {
        let dy = ny - yi;
        for nx in x0..=x1 {
            let dx = nx - xi;
            if (dx == 0 && dy == 0) || ((dx * dx + dy * dy) as f64) > radius_sq {
                continue;
            }
            let other = pixels[ny as usize * width + nx as usize];
            if other > value || (other == value && (ny, nx) < (yi, xi)) {
                return false;
            }
        }
    }
    true
}

fn centroid(
    pixels: &[f32],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    background: f32,
) -> LocalDetection {
    let peak = pixels[y * width + x] - background;
    let (xi, yi) = (x as i64, y as i64);

    let mut sum_w = 0.0f64;
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let (y0, y1) = (
        (yi - CENTROID_HALF_WIDTH).max(0),
        (yi + CENTROID_HALF_WIDTH).min(height as i64 - 1),
    );
    let (x0, x1) = (
        (xi - CENTROID_HALF_WIDTH).max(0),
        (xi + CENTROID_HALF_WIDTH).min(width as i64 - 1),
    );
    for ny in y0..=y1 {
        for nx in x0..=x1 {
            let w = (pixels[ny as usize * width + nx as usize] - background).max(0.0) as f64;
            sum_w += w;
            sum_x += w * nx as f64;
            sum_y += w * ny as f64;
        }
    }

    if sum_w <= 0.0 {
        return LocalDetection::new(x as f64, y as f64, 0.0, peak);
    }
    LocalDetection::new(sum_x / sum_w, sum_y / sum_w, sum_w as f32, peak)
}
