//! Detection markers drawn over the source image.

use std::path::Path;

use image::{DynamicImage, Rgba};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut};

use crate::detection::Detection;
use crate::error::Result;
use crate::image_io::{load_image, save_image};

pub const MARKER_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Returns a copy of `source` with a circle of diameter `marker_size` and a
/// center cross drawn at every detection.
///
/// Markers partly outside the image are clipped and markers entirely outside
/// are not drawn. Detections with non-finite coordinates are skipped.
pub fn render(source: &DynamicImage, detections: &[Detection], marker_size: u32) -> DynamicImage {
    let mut canvas = source.clone();
    let radius = (marker_size / 2) as i32;
    let reach = f64::from(radius) + 1.0;
    let (width, height) = (f64::from(source.width()), f64::from(source.height()));

    let mut skipped = 0usize;
    for detection in detections {
        if !detection.pos.is_finite() {
            skipped += 1;
            continue;
        }
        let (x, y) = (detection.pos.x, detection.pos.y);
        if x < -reach || y < -reach || x > width + reach || y > height + reach {
            continue;
        }
        let cx = detection.pos.x.round() as i32;
        let cy = detection.pos.y.round() as i32;
        if radius > 0 {
            draw_hollow_circle_mut(&mut canvas, (cx, cy), radius, MARKER_COLOR);
        }
        draw_cross_mut(&mut canvas, MARKER_COLOR, cx, cy);
    }

    if skipped > 0 {
        tracing::warn!(skipped, "Skipped detections with non-finite coordinates");
    }
    canvas
}

/// Loads `source_path`, draws `detections` and writes the result to `output_path`.
pub fn render_file(
    source_path: &Path,
    detections: &[Detection],
    marker_size: u32,
    output_path: &Path,
) -> Result<()> {
    let source = load_image(source_path)?;
    let overlay = render(&source, detections, marker_size);
    save_image(output_path, &overlay)?;

    tracing::info!(
        source = %source_path.display(),
        output = %output_path.display(),
        markers = detections.len(),
        "Rendered overlay"
    );
    Ok(())
}
