//! Image decode/encode on top of the `image` crate.

use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

/// Decodes the image at `path`, guessing the format from its contents and extension.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Encodes `image` to `path` in the format implied by the extension.
///
/// Formats without an alpha channel (JPEG) get the alpha dropped first.
pub fn save_image(path: &Path, image: &DynamicImage) -> Result<()> {
    let to_err = |source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    };

    let format = ImageFormat::from_path(path).map_err(to_err)?;
    if format == ImageFormat::Jpeg && image.color().has_alpha() {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        return rgb.save_with_format(path, format).map_err(to_err);
    }
    image.save_with_format(path, format).map_err(to_err)
}
