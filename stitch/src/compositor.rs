//! Canvas sizing, perspective warping and hard-overlay compositing.

use crate::{Result, StitchError};
use image::RgbImage;
use nalgebra::Matrix3;
use pano_core::geometry::{image_corners, project_corners, translation_matrix};
use pano_imgproc::warp_perspective_rgb;

/// Refuse canvases beyond this per-side bound; a formally invertible
/// homography can still blow the bounding box past any plausible panorama.
pub const MAX_CANVAS_DIM: i64 = 16384;

const DET_EPS: f64 = 1e-8;

/// A composite image together with the translation that was applied to keep
/// all warped content at non-negative coordinates.
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: RgbImage,
    pub offset: (i64, i64),
}

/// Warp `image_a` through `homography` into a canvas sized to the union of
/// both images, then overwrite `image_b` at its native (translated)
/// footprint. Overlapping content from `image_a` is discarded, not blended.
pub fn composite(
    image_a: &RgbImage,
    image_b: &RgbImage,
    homography: &Matrix3<f64>,
) -> Result<Composite> {
    if homography.determinant().abs() < DET_EPS {
        return Err(StitchError::DegenerateHomography);
    }

    let corners_a = project_corners(homography, image_a.width(), image_a.height());
    let corners_b = image_corners(image_b.width(), image_b.height());

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in corners_a.iter().chain(corners_b.iter()) {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }

    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return Err(StitchError::MalformedCanvas {
            width: 0,
            height: 0,
        });
    }

    // Half-pixel expansion, truncated toward zero.
    let x_min = (min_x - 0.5) as i64;
    let y_min = (min_y - 0.5) as i64;
    let x_max = (max_x + 0.5) as i64;
    let y_max = (max_y + 0.5) as i64;

    let width = x_max - x_min;
    let height = y_max - y_min;
    if width <= 0 || height <= 0 || width > MAX_CANVAS_DIM || height > MAX_CANVAS_DIM {
        return Err(StitchError::MalformedCanvas { width, height });
    }

    let offset = (-x_min, -y_min);
    let combined = translation_matrix(offset.0 as f64, offset.1 as f64) * homography;
    let inverse = combined
        .try_inverse()
        .ok_or(StitchError::DegenerateHomography)?;

    let mut canvas = warp_perspective_rgb(image_a, &inverse, width as u32, height as u32);

    // Hard overlay of image_b; its footprint is inside the canvas by
    // construction of the bounding box.
    for (x, y, p) in image_b.enumerate_pixels() {
        let cx = x as i64 + offset.0;
        let cy = y as i64 + offset.1;
        if cx >= 0 && cy >= 0 && cx < width && cy < height {
            canvas.put_pixel(cx as u32, cy as u32, *p);
        }
    }

    Ok(Composite {
        image: canvas,
        offset,
    })
}
