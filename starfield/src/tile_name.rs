//! Tile file naming: `img<x>x<y>.<ext>`, where `(x, y)` is the tile's
//! top-left offset in the source image.
//!
//! This is the only place that knows the naming convention. The tiler encodes
//! with it and the analysis stage decodes with it.

use std::path::Path;

use image::ImageFormat;

use crate::detection::TileOffset;

pub const TILE_PREFIX: &str = "img";
pub const DEFAULT_TILE_EXTENSION: &str = "png";

/// Builds the file name for a tile at `offset`.
pub fn encode(offset: TileOffset, extension: &str) -> String {
    format!("{TILE_PREFIX}{}x{}.{extension}", offset.x, offset.y)
}

/// Recovers the tile offset from a file name.
///
/// Returns `None` for anything that is not exactly `img<digits>x<digits>.<ext>`
/// where `<ext>` names a format this build can decode. Offsets must fit in `u32`.
pub fn decode(name: &str) -> Option<TileOffset> {
    let rest = name.strip_prefix(TILE_PREFIX)?;
    let (coords, extension) = rest.split_once('.')?;
    if !format_of(extension).is_some_and(|f| f.reading_enabled()) {
        return None;
    }

    let (x, y) = coords.split_once('x')?;
    Some(TileOffset::new(parse_digits(x)?, parse_digits(y)?))
}

/// Like [`decode`], applied to the final component of `path`.
pub fn decode_path(path: &Path) -> Option<TileOffset> {
    decode(path.file_name()?.to_str()?)
}

/// True if tiles with this extension can be both written and read back.
pub fn is_tile_extension(extension: &str) -> bool {
    format_of(extension).is_some_and(|f| f.reading_enabled() && f.writing_enabled())
}

fn format_of(extension: &str) -> Option<ImageFormat> {
    if extension.is_empty() || !extension.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    ImageFormat::from_extension(extension)
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
