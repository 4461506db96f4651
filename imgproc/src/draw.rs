//! Diagnostic overlays: keypoint markers, descriptor-region circles and
//! side-by-side match visualizations. Pure buffer edits; callers own all I/O.

use image::{Rgb, RgbImage};
use pano_core::{KeyPoints, Matches};
use rand::Rng;

fn put_safe(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

pub fn draw_line(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        put_safe(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

pub fn draw_circle(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    if radius <= 0 {
        put_safe(img, cx, cy, color);
        return;
    }

    let mut x = radius;
    let mut y = 0i64;
    let mut err = 1 - radius;

    while x >= y {
        for (px, py) in [
            (cx + x, cy + y),
            (cx - x, cy + y),
            (cx + x, cy - y),
            (cx - x, cy - y),
            (cx + y, cy + x),
            (cx - y, cy + x),
            (cx + y, cy - x),
            (cx - y, cy - x),
        ] {
            put_safe(img, px, py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

fn random_color(rng: &mut impl Rng) -> Rgb<u8> {
    Rgb([rng.gen(), rng.gen(), rng.gen()])
}

/// Mark each keypoint location with a small fixed-color circle.
pub fn draw_keypoints(image: &RgbImage, keypoints: &KeyPoints) -> RgbImage {
    let mut out = image.clone();
    for kp in keypoints.iter() {
        draw_circle(&mut out, kp.x as i64, kp.y as i64, 3, Rgb([0, 255, 0]));
    }
    out
}

/// Circle each keypoint at its detection scale, one random color per
/// keypoint. The RNG comes from the caller so overlays are reproducible.
pub fn draw_keypoint_regions(
    image: &RgbImage,
    keypoints: &KeyPoints,
    rng: &mut impl Rng,
) -> RgbImage {
    let mut out = image.clone();
    for kp in keypoints.iter() {
        let color = random_color(rng);
        draw_circle(&mut out, kp.x as i64, kp.y as i64, kp.size.round() as i64, color);
    }
    out
}

/// Side-by-side pair with one colored line per retained match.
pub fn draw_matches(
    image_a: &RgbImage,
    keypoints_a: &KeyPoints,
    image_b: &RgbImage,
    keypoints_b: &KeyPoints,
    matches: &Matches,
    rng: &mut impl Rng,
) -> RgbImage {
    let width = image_a.width() + image_b.width();
    let height = image_a.height().max(image_b.height());
    let mut out = RgbImage::new(width, height);

    for (x, y, p) in image_a.enumerate_pixels() {
        out.put_pixel(x, y, *p);
    }
    let offset = image_a.width();
    for (x, y, p) in image_b.enumerate_pixels() {
        out.put_pixel(x + offset, y, *p);
    }

    for m in matches.iter() {
        let (Some(ka), Some(kb)) = (
            keypoints_a.keypoints.get(m.query_idx),
            keypoints_b.keypoints.get(m.train_idx),
        ) else {
            continue;
        };
        let color = random_color(rng);
        let (x0, y0) = (ka.x as i64, ka.y as i64);
        let (x1, y1) = (kb.x as i64 + offset as i64, kb.y as i64);
        draw_circle(&mut out, x0, y0, 2, color);
        draw_circle(&mut out, x1, y1, 2, color);
        draw_line(&mut out, x0, y0, x1, y1, color);
    }

    out
}
