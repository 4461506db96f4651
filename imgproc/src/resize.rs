use image::{GrayImage, RgbImage};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Linear,
}

/// Map a destination coordinate to the source grid (pixel-center aligned).
fn src_coord(dst: usize, scale: f32) -> f32 {
    (dst as f32 + 0.5) * scale - 0.5
}

pub fn resize(src: &GrayImage, width: u32, height: u32, interpolation: Interpolation) -> GrayImage {
    if width == 0 || height == 0 || src.width() == 0 || src.height() == 0 {
        return GrayImage::new(width, height);
    }

    let sw = src.width() as usize;
    let sh = src.height() as usize;
    let raw = src.as_raw();
    let scale_x = sw as f32 / width as f32;
    let scale_y = sh as f32 / height as f32;

    let mut dst = GrayImage::new(width, height);
    dst.as_mut()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = src_coord(y, scale_y);
            for (x, out) in row.iter_mut().enumerate() {
                let sx = src_coord(x, scale_x);
                *out = match interpolation {
                    Interpolation::Nearest => {
                        let ix = (sx.round().max(0.0) as usize).min(sw - 1);
                        let iy = (sy.round().max(0.0) as usize).min(sh - 1);
                        raw[iy * sw + ix]
                    }
                    Interpolation::Linear => {
                        sample_linear(raw, sw, sh, 1, 0, sx, sy).clamp(0.0, 255.0) as u8
                    }
                };
            }
        });

    dst
}

pub fn resize_rgb(
    src: &RgbImage,
    width: u32,
    height: u32,
    interpolation: Interpolation,
) -> RgbImage {
    if width == 0 || height == 0 || src.width() == 0 || src.height() == 0 {
        return RgbImage::new(width, height);
    }

    let sw = src.width() as usize;
    let sh = src.height() as usize;
    let raw = src.as_raw();
    let scale_x = sw as f32 / width as f32;
    let scale_y = sh as f32 / height as f32;

    let mut dst = RgbImage::new(width, height);
    dst.as_mut()
        .par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = src_coord(y, scale_y);
            for x in 0..width as usize {
                let sx = src_coord(x, scale_x);
                for c in 0..3 {
                    row[x * 3 + c] = match interpolation {
                        Interpolation::Nearest => {
                            let ix = (sx.round().max(0.0) as usize).min(sw - 1);
                            let iy = (sy.round().max(0.0) as usize).min(sh - 1);
                            raw[(iy * sw + ix) * 3 + c]
                        }
                        Interpolation::Linear => {
                            sample_linear(raw, sw, sh, 3, c, sx, sy).clamp(0.0, 255.0) as u8
                        }
                    };
                }
            }
        });

    dst
}

/// Bilinear sample of one channel from an interleaved buffer, with replicate
/// borders.
fn sample_linear(
    raw: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    channel: usize,
    x: f32,
    y: f32,
) -> f32 {
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let clamp_x = |v: isize| v.clamp(0, width as isize - 1) as usize;
    let clamp_y = |v: isize| v.clamp(0, height as isize - 1) as usize;

    let at = |ix: usize, iy: usize| raw[(iy * width + ix) * channels + channel] as f32;

    let v00 = at(clamp_x(x0), clamp_y(y0));
    let v10 = at(clamp_x(x0 + 1), clamp_y(y0));
    let v01 = at(clamp_x(x0), clamp_y(y0 + 1));
    let v11 = at(clamp_x(x0 + 1), clamp_y(y0 + 1));

    let v0 = v00 * (1.0 - fx) + v10 * fx;
    let v1 = v01 * (1.0 - fx) + v11 * fx;
    v0 * (1.0 - fy) + v1 * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn resize_halves_dimensions() {
        let img = GrayImage::from_pixel(16, 8, Luma([77]));
        let out = resize(&img, 8, 4, Interpolation::Linear);
        assert_eq!(out.dimensions(), (8, 4));
        for p in out.pixels() {
            assert_eq!(p[0], 77);
        }
    }

    #[test]
    fn resize_identity_keeps_pixels() {
        let mut img = GrayImage::new(6, 6);
        img.put_pixel(2, 3, Luma([210]));
        let out = resize(&img, 6, 6, Interpolation::Nearest);
        assert_eq!(out.get_pixel(2, 3)[0], 210);
    }

    #[test]
    fn resize_rgb_preserves_channels() {
        let img = RgbImage::from_pixel(10, 10, image::Rgb([10, 120, 250]));
        let out = resize_rgb(&img, 5, 5, Interpolation::Linear);
        for p in out.pixels() {
            assert_eq!(p.0, [10, 120, 250]);
        }
    }

    #[test]
    fn resize_to_zero_is_empty() {
        let img = GrayImage::new(8, 8);
        let out = resize(&img, 0, 4, Interpolation::Linear);
        assert_eq!(out.dimensions(), (0, 4));
    }
}
