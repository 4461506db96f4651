use image::GrayImage;
use pano_imgproc::{gaussian_blur, resize, Interpolation};

/// Octaves below this size carry no usable corner neighborhoods.
const MIN_OCTAVE_DIM: u32 = 16;

/// Gaussian octave pyramid: each level is smoothed and half the size of the
/// previous one.
pub struct Pyramid {
    pub octaves: Vec<GrayImage>,
}

impl Pyramid {
    /// Factor mapping octave-local coordinates back to base-image
    /// coordinates.
    pub fn scale(octave: usize) -> f64 {
        (1u32 << octave) as f64
    }
}

pub fn build_pyramid(image: &GrayImage, n_octaves: usize, sigma: f32) -> Pyramid {
    let mut octaves = Vec::with_capacity(n_octaves);
    if image.width() < MIN_OCTAVE_DIM || image.height() < MIN_OCTAVE_DIM {
        return Pyramid { octaves };
    }

    let mut current = gaussian_blur(image, sigma);
    for octave in 0..n_octaves {
        octaves.push(current.clone());

        if octave + 1 == n_octaves {
            break;
        }
        let (w, h) = (current.width() / 2, current.height() / 2);
        if w < MIN_OCTAVE_DIM || h < MIN_OCTAVE_DIM {
            break;
        }
        current = gaussian_blur(&resize(&current, w, h, Interpolation::Linear), sigma);
    }

    Pyramid { octaves }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_halves_each_octave() {
        let img = GrayImage::new(128, 96);
        let pyramid = build_pyramid(&img, 3, 1.2);
        assert_eq!(pyramid.octaves.len(), 3);
        assert_eq!(pyramid.octaves[0].dimensions(), (128, 96));
        assert_eq!(pyramid.octaves[1].dimensions(), (64, 48));
        assert_eq!(pyramid.octaves[2].dimensions(), (32, 24));
    }

    #[test]
    fn pyramid_stops_before_degenerate_octaves() {
        let img = GrayImage::new(40, 40);
        let pyramid = build_pyramid(&img, 5, 1.2);
        // 40 -> 20 -> 10 would go below the minimum, so only two octaves.
        assert_eq!(pyramid.octaves.len(), 2);
    }

    #[test]
    fn tiny_image_yields_empty_pyramid() {
        let img = GrayImage::new(8, 8);
        let pyramid = build_pyramid(&img, 3, 1.2);
        assert!(pyramid.octaves.is_empty());
    }
}
