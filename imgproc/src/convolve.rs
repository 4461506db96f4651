use image::GrayImage;
use rayon::prelude::*;

/// How coordinates outside the image are resolved when sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    Constant(u8),
    Replicate,
}

pub(crate) fn map_coord(coord: isize, len: usize, mode: BorderMode) -> Option<usize> {
    let n = len as isize;
    if n <= 0 {
        return None;
    }

    match mode {
        BorderMode::Constant(_) => {
            if coord < 0 || coord >= n {
                None
            } else {
                Some(coord as usize)
            }
        }
        BorderMode::Replicate => Some(coord.clamp(0, n - 1) as usize),
    }
}

pub(crate) fn border_value(mode: BorderMode) -> f32 {
    match mode {
        BorderMode::Constant(v) => v as f32,
        BorderMode::Replicate => 0.0,
    }
}

/// Normalized 1-D Gaussian kernel. `size` must be odd.
pub fn gaussian_kernel_1d(sigma: f32, size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "kernel size must be odd");
    let half = (size / 2) as isize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| {
            let d = i as f32;
            (-d * d / denom).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Separable convolution: horizontal pass with `kx`, vertical pass with `ky`.
pub fn separable_convolve(
    image: &GrayImage,
    kx: &[f32],
    ky: &[f32],
    border: BorderMode,
) -> GrayImage {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let w = width as usize;
    let h = height as usize;
    let raw = image.as_raw();
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    let mut tmp = vec![0.0f32; w * h];
    tmp.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (i, &kv) in kx.iter().enumerate() {
                let sx = x as isize + i as isize - rx;
                let v = match map_coord(sx, w, border) {
                    Some(ix) => raw[y * w + ix] as f32,
                    None => border_value(border),
                };
                acc += kv * v;
            }
            row[x] = acc;
        }
    });

    let mut dst = GrayImage::new(width, height);
    dst.as_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let mut acc = 0.0f32;
                for (i, &kv) in ky.iter().enumerate() {
                    let sy = y as isize + i as isize - ry;
                    let v = match map_coord(sy, h, border) {
                        Some(iy) => tmp[iy * w + x],
                        None => border_value(border),
                    };
                    acc += kv * v;
                }
                row[x] = acc.clamp(0.0, 255.0).round() as u8;
            }
        });

    dst
}

pub fn gaussian_blur_with_border(image: &GrayImage, sigma: f32, border: BorderMode) -> GrayImage {
    let size = ((sigma * 6.0).ceil() as usize) | 1;
    let kernel = gaussian_kernel_1d(sigma, size);
    separable_convolve(image, &kernel, &kernel, border)
}

pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_with_border(image, sigma, BorderMode::Replicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn gaussian_kernel_1d_is_normalized() {
        let k = gaussian_kernel_1d(1.2, 7);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn gaussian_blur_preserves_size() {
        let mut img = GrayImage::new(32, 24);
        img.put_pixel(10, 10, Luma([255]));

        let out = gaussian_blur(&img, 1.0);
        assert_eq!(out.width(), img.width());
        assert_eq!(out.height(), img.height());
    }

    #[test]
    fn blur_spreads_impulse() {
        let mut img = GrayImage::new(15, 15);
        img.put_pixel(7, 7, Luma([255]));

        let out = gaussian_blur(&img, 1.5);
        assert!(out.get_pixel(7, 7)[0] < 255);
        assert!(out.get_pixel(8, 7)[0] > 0);
        assert!(out.get_pixel(7, 8)[0] > 0);
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(20, 20, Luma([100]));
        let out = gaussian_blur(&img, 2.0);
        for p in out.pixels() {
            assert!((p[0] as i32 - 100).abs() <= 1);
        }
    }
}
