//! Splits a source image into a row-major grid of fixed-size tiles on disk.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::detection::TileOffset;
use crate::error::{Error, Result};
use crate::image_io::{load_image, save_image};
use crate::tile_name;

/// Nominal tile dimensions. Edge tiles may come out smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_input(format!(
                "tile size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

/// One tile's region in the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    pub offset: TileOffset,
    pub width: u32,
    pub height: u32,
}

impl TileSpec {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.offset.x
            && y >= self.offset.y
            && x - self.offset.x < self.width
            && y - self.offset.y < self.height
    }
}

/// Lays out the tiles covering a `width x height` image, row-major from `(0, 0)`.
///
/// Tiles never overlap and leave no gap; the last column and row are clipped
/// to the image bounds.
pub fn tile_grid(width: u32, height: u32, size: TileSize) -> Result<Vec<TileSpec>> {
    size.validate()?;
    if width == 0 || height == 0 {
        return Err(Error::invalid_input(format!(
            "source image is empty ({width}x{height})"
        )));
    }

    let mut specs = Vec::with_capacity(
        width.div_ceil(size.width) as usize * height.div_ceil(size.height) as usize,
    );
    for y in (0..height).step_by(size.height as usize) {
        for x in (0..width).step_by(size.width as usize) {
            specs.push(TileSpec {
                offset: TileOffset::new(x, y),
                width: size.width.min(width - x),
                height: size.height.min(height - y),
            });
        }
    }
    Ok(specs)
}

/// Writes every tile of `image` into `output_dir` as `img<x>x<y>.<extension>`.
///
/// The directory is created if missing. Tiles are encoded in parallel; the first
/// write failure aborts the crop.
pub fn crop(
    image: &DynamicImage,
    output_dir: &Path,
    size: TileSize,
    extension: &str,
) -> Result<()> {
    if !tile_name::is_tile_extension(extension) {
        return Err(Error::invalid_input(format!(
            "unsupported tile extension '{extension}'"
        )));
    }

    let (width, height) = image.dimensions();
    let specs = tile_grid(width, height, size)?;

    std::fs::create_dir_all(output_dir).map_err(|source| Error::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    tracing::info!(
        width,
        height,
        tile_width = size.width,
        tile_height = size.height,
        tile_count = specs.len(),
        output_dir = %output_dir.display(),
        "Cropping source image"
    );

    specs.par_iter().try_for_each(|spec| {
        let tile = image.crop_imm(spec.offset.x, spec.offset.y, spec.width, spec.height);
        let path = output_dir.join(tile_name::encode(spec.offset, extension));
        save_image(&path, &tile)
    })?;

    tracing::debug!(tile_count = specs.len(), "Tiles written");
    Ok(())
}

/// Loads `source_path` and crops it with [`crop`].
pub fn crop_file(
    source_path: &Path,
    output_dir: &Path,
    size: TileSize,
    extension: &str,
) -> Result<()> {
    let image = load_image(source_path)?;
    crop(&image, output_dir, size, extension)
}
