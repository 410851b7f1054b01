//! Detection result types.
//!
//! A [`LocalDetection`] lives in a tile's own pixel frame; a [`Detection`]
//! lives in the frame of the full source image.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use glam::{DVec2, UVec2};

/// Global pixel offset of a tile's top-left corner.
pub type TileOffset = UVec2;

/// An object reported by a detector, relative to the tile origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalDetection {
    /// Sub-pixel position in `[0, tile_width) x [0, tile_height)`.
    pub pos: DVec2,
    /// Background-subtracted flux.
    pub flux: f32,
    /// Background-subtracted peak value.
    pub peak: f32,
}

impl LocalDetection {
    pub fn new(x: f64, y: f64, flux: f32, peak: f32) -> Self {
        Self {
            pos: DVec2::new(x, y),
            flux,
            peak,
        }
    }

    /// Translates into the source image frame by adding the tile offset.
    pub fn to_global(&self, offset: TileOffset) -> Detection {
        Detection {
            pos: self.pos + offset.as_dvec2(),
            flux: self.flux,
            peak: self.peak,
        }
    }
}

/// An object position in the source image frame.
///
/// Identity is structural; there is no stored id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub pos: DVec2,
    pub flux: f32,
    pub peak: f32,
}

impl Detection {
    pub fn new(x: f64, y: f64, flux: f32, peak: f32) -> Self {
        Self {
            pos: DVec2::new(x, y),
            flux,
            peak,
        }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.pos.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.pos.y
    }

    /// Total order used wherever output must not depend on input order:
    /// ascending y, then x, then flux, then peak.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.pos
            .y
            .total_cmp(&other.pos.y)
            .then_with(|| self.pos.x.total_cmp(&other.pos.x))
            .then_with(|| self.flux.total_cmp(&other.flux))
            .then_with(|| self.peak.total_cmp(&other.peak))
    }
}

/// Sorts detections into [`Detection::canonical_cmp`] order.
pub fn sort_canonical(detections: &mut [Detection]) {
    detections.sort_by(Detection::canonical_cmp);
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x={} y={} flux={} peak={}",
            self.pos.x, self.pos.y, self.flux, self.peak
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed detection '{line}': {reason}")]
pub struct ParseDetectionError {
    pub line: String,
    pub reason: String,
}

impl FromStr for Detection {
    type Err = ParseDetectionError;

    /// Parses the `key=value` form written by `Display`. Keys may appear in any order.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| ParseDetectionError {
            line: line.to_string(),
            reason,
        };

        let (mut x, mut y, mut flux, mut peak) = (None, None, None, None);
        for field in line.split_whitespace() {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| fail(format!("field '{field}' has no '='")))?;
            match key {
                "x" => x = Some(value.parse::<f64>().map_err(|e| fail(e.to_string()))?),
                "y" => y = Some(value.parse::<f64>().map_err(|e| fail(e.to_string()))?),
                "flux" => flux = Some(value.parse::<f32>().map_err(|e| fail(e.to_string()))?),
                "peak" => peak = Some(value.parse::<f32>().map_err(|e| fail(e.to_string()))?),
                other => return Err(fail(format!("unknown field '{other}'"))),
            }
        }

        match (x, y) {
            (Some(x), Some(y)) => Ok(Detection::new(
                x,
                y,
                flux.unwrap_or(0.0),
                peak.unwrap_or(0.0),
            )),
            _ => Err(fail("missing x or y".to_string())),
        }
    }
}
