//! Synthetic images and helpers shared by unit tests.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma};

/// Initialize tracing subscriber for tests. Safe to call multiple times.
pub fn init_tracing() {
    common::log_setup::init_test_logging();
}

/// Renders Gaussian point sources on a flat background as an 8-bit grayscale image.
///
/// Values are in `[0, 1]` before quantization; `stars` holds `(x, y)` centers
/// in pixel coordinates.
pub fn star_field(
    width: u32,
    height: u32,
    stars: &[(f64, f64)],
    sigma: f64,
    amplitude: f64,
    background: f64,
) -> DynamicImage {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let img = GrayImage::from_fn(width, height, |x, y| {
        let mut value = background;
        for &(cx, cy) in stars {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            value += amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
        }
        Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    });
    DynamicImage::ImageLuma8(img)
}

/// [`star_field`] with the defaults used across the test suite.
pub fn default_star_field(width: u32, height: u32, stars: &[(f64, f64)]) -> DynamicImage {
    star_field(width, height, stars, 1.5, 0.8, 0.1)
}

/// Blank image of the given size.
pub fn blank(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([26])))
}
