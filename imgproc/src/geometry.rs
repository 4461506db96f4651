use crate::convolve::{border_value, map_coord, BorderMode};
use crate::resize::Interpolation;
use image::{GrayImage, RgbImage};
use nalgebra::{Matrix3, Point2};
use pano_core::geometry::project_point;
use rayon::prelude::*;

pub fn get_pixel_bilinear(img: &GrayImage, x: f32, y: f32) -> f32 {
    get_pixel_bilinear_with_border(img, x, y, BorderMode::Constant(0))
}

fn get_pixel_bilinear_with_border(img: &GrayImage, x: f32, y: f32, border: BorderMode) -> f32 {
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let v00 = sample_pixel(img, x0, y0, border);
    let v10 = sample_pixel(img, x1, y0, border);
    let v01 = sample_pixel(img, x0, y1, border);
    let v11 = sample_pixel(img, x1, y1, border);

    let v0 = v00 * (1.0 - fx) + v10 * fx;
    let v1 = v01 * (1.0 - fx) + v11 * fx;

    v0 * (1.0 - fy) + v1 * fy
}

fn get_pixel_nearest_with_border(img: &GrayImage, x: f32, y: f32, border: BorderMode) -> f32 {
    sample_pixel(img, x.round() as isize, y.round() as isize, border)
}

fn sample_pixel(img: &GrayImage, x: isize, y: isize, border: BorderMode) -> f32 {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let raw = img.as_raw();

    match (map_coord(x, width, border), map_coord(y, height, border)) {
        (Some(ix), Some(iy)) => raw[iy * width + ix] as f32,
        _ => border_value(border),
    }
}

fn sample_pixel_rgb(img: &RgbImage, x: isize, y: isize, border: BorderMode) -> [f32; 3] {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let raw = img.as_raw();

    match (map_coord(x, width, border), map_coord(y, height, border)) {
        (Some(ix), Some(iy)) => {
            let base = (iy * width + ix) * 3;
            [
                raw[base] as f32,
                raw[base + 1] as f32,
                raw[base + 2] as f32,
            ]
        }
        _ => [border_value(border); 3],
    }
}

fn get_pixel_bilinear_rgb(img: &RgbImage, x: f32, y: f32, border: BorderMode) -> [f32; 3] {
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let v00 = sample_pixel_rgb(img, x0, y0, border);
    let v10 = sample_pixel_rgb(img, x0 + 1, y0, border);
    let v01 = sample_pixel_rgb(img, x0, y0 + 1, border);
    let v11 = sample_pixel_rgb(img, x0 + 1, y0 + 1, border);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let v0 = v00[c] * (1.0 - fx) + v10[c] * fx;
        let v1 = v01[c] * (1.0 - fx) + v11[c] * fx;
        out[c] = v0 * (1.0 - fy) + v1 * fy;
    }
    out
}

/// Warp by inverse mapping: `matrix` maps each destination pixel to its
/// source location. Callers holding a source-to-destination homography pass
/// its inverse.
pub fn warp_perspective_ex(
    src: &GrayImage,
    matrix: &Matrix3<f64>,
    width: u32,
    height: u32,
    interpolation: Interpolation,
    border: BorderMode,
) -> GrayImage {
    let mut dst = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    dst.as_mut()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let src_pt = project_point(matrix, Point2::new(x as f64, y as f64));
                let (sx, sy) = (src_pt.x as f32, src_pt.y as f32);
                let val = match interpolation {
                    Interpolation::Nearest => get_pixel_nearest_with_border(src, sx, sy, border),
                    Interpolation::Linear => get_pixel_bilinear_with_border(src, sx, sy, border),
                };
                *out = val.clamp(0.0, 255.0) as u8;
            }
        });

    dst
}

pub fn warp_perspective(
    src: &GrayImage,
    matrix: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> GrayImage {
    warp_perspective_ex(
        src,
        matrix,
        width,
        height,
        Interpolation::Linear,
        BorderMode::Constant(0),
    )
}

/// RGB variant of [`warp_perspective_ex`]; undefined source locations stay
/// background zero.
pub fn warp_perspective_rgb_ex(
    src: &RgbImage,
    matrix: &Matrix3<f64>,
    width: u32,
    height: u32,
    interpolation: Interpolation,
    border: BorderMode,
) -> RgbImage {
    let mut dst = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    dst.as_mut()
        .par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width as usize {
                let src_pt = project_point(matrix, Point2::new(x as f64, y as f64));
                let (sx, sy) = (src_pt.x as f32, src_pt.y as f32);
                let val = match interpolation {
                    Interpolation::Nearest => {
                        sample_pixel_rgb(src, sx.round() as isize, sy.round() as isize, border)
                    }
                    Interpolation::Linear => get_pixel_bilinear_rgb(src, sx, sy, border),
                };
                for c in 0..3 {
                    row[x * 3 + c] = val[c].clamp(0.0, 255.0) as u8;
                }
            }
        });

    dst
}

pub fn warp_perspective_rgb(
    src: &RgbImage,
    matrix: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> RgbImage {
    warp_perspective_rgb_ex(
        src,
        matrix,
        width,
        height,
        Interpolation::Linear,
        BorderMode::Constant(0),
    )
}
