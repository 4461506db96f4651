use image::GrayImage;
use pano_core::{Descriptors, KeyPoint, KeyPoints};
use pano_imgproc::get_pixel_bilinear;
use rayon::prelude::*;

/// 4x4 spatial cells x 8 orientation bins.
pub const DESCRIPTOR_DIM: usize = GRID * GRID * BINS;

const GRID: usize = 4;
const BINS: usize = 8;
/// Sample lattice across the window; 4x4 samples feed each spatial cell.
const SAMPLES: usize = 16;
/// Gradient energy clamp before renormalization, to dampen spikes.
const CLAMP: f32 = 0.2;

/// Compute one fixed-length descriptor per keypoint: gradient orientation
/// histograms over a window rotated by the keypoint angle and scaled by the
/// keypoint size, L2-normalized.
///
/// Keypoints whose rotated window leaves the image, or whose window carries
/// no gradient energy, are dropped together with their would-be descriptor;
/// the returned sets stay parallel (`keypoints.len() == descriptors.len()`).
pub fn extract_descriptors(image: &GrayImage, keypoints: &KeyPoints) -> (KeyPoints, Descriptors) {
    let described: Vec<(KeyPoint, Vec<f32>)> = keypoints
        .keypoints
        .par_iter()
        .filter_map(|kp| describe_keypoint(image, kp).map(|d| (*kp, d)))
        .collect();

    let mut kept = KeyPoints::with_capacity(described.len());
    let mut descriptors = Descriptors::with_capacity(DESCRIPTOR_DIM, described.len());
    for (kp, d) in described {
        kept.push(kp);
        descriptors.push(&d);
    }
    (kept, descriptors)
}

fn describe_keypoint(image: &GrayImage, kp: &KeyPoint) -> Option<Vec<f32>> {
    let w = kp.size;
    // The rotated window plus the finite-difference probe must stay inside.
    let margin = w * std::f64::consts::SQRT_2 + 2.0;
    if kp.x - margin < 0.0
        || kp.y - margin < 0.0
        || kp.x + margin >= image.width() as f64
        || kp.y + margin >= image.height() as f64
    {
        return None;
    }

    let angle = kp.angle.to_radians();
    let (sin_a, cos_a) = angle.sin_cos();
    let sigma2 = (w * 0.5) * (w * 0.5) * 2.0;

    let mut hist = vec![0.0f32; DESCRIPTOR_DIM];

    for j in 0..SAMPLES {
        let v = ((j as f64 + 0.5) / SAMPLES as f64) * 2.0 * w - w;
        for i in 0..SAMPLES {
            let u = ((i as f64 + 0.5) / SAMPLES as f64) * 2.0 * w - w;

            // Sample position in image coordinates, steered by the keypoint
            // orientation.
            let dx = cos_a * u - sin_a * v;
            let dy = sin_a * u + cos_a * v;
            let sx = (kp.x + dx) as f32;
            let sy = (kp.y + dy) as f32;

            let gx = (get_pixel_bilinear(image, sx + 1.0, sy)
                - get_pixel_bilinear(image, sx - 1.0, sy))
                * 0.5;
            let gy = (get_pixel_bilinear(image, sx, sy + 1.0)
                - get_pixel_bilinear(image, sx, sy - 1.0))
                * 0.5;
            let mag = (gx * gx + gy * gy).sqrt();
            if mag < 1e-6 {
                continue;
            }

            // Gradient direction relative to the keypoint frame.
            let mut ori = gy.atan2(gx) as f64 - angle;
            while ori < 0.0 {
                ori += std::f64::consts::TAU;
            }
            while ori >= std::f64::consts::TAU {
                ori -= std::f64::consts::TAU;
            }
            let bin = ((ori / std::f64::consts::TAU * BINS as f64) as usize).min(BINS - 1);

            let cell_x = i * GRID / SAMPLES;
            let cell_y = j * GRID / SAMPLES;
            let weight = (-(u * u + v * v) / sigma2).exp() as f32;

            hist[(cell_y * GRID + cell_x) * BINS + bin] += weight * mag;
        }
    }

    normalize(&mut hist)?;
    Some(hist)
}

fn normalize(hist: &mut [f32]) -> Option<()> {
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < 1e-6 {
        return None;
    }
    for v in hist.iter_mut() {
        *v = (*v / norm).min(CLAMP);
    }
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < 1e-6 {
        return None;
    }
    for v in hist.iter_mut() {
        *v /= norm;
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use pano_core::euclidean_distance;

    /// A small asymmetric pattern with internal gradient structure.
    fn paint_pattern(img: &mut GrayImage, cx: f64, cy: f64, angle: f64) {
        let (sin_a, cos_a) = angle.sin_cos();
        let dots: [(f64, f64, u8); 4] = [
            (4.0, 0.0, 255),
            (-3.0, 2.0, 170),
            (0.0, -4.0, 210),
            (2.0, 4.0, 120),
        ];
        for (u, v, value) in dots {
            let x = cx + cos_a * u - sin_a * v;
            let y = cy + sin_a * u + cos_a * v;
            for dy in -1..=1i32 {
                for dx in -1..=1i32 {
                    let px = (x as i32 + dx) as u32;
                    let py = (y as i32 + dy) as u32;
                    img.put_pixel(px, py, Luma([value]));
                }
            }
        }
    }

    #[test]
    fn keypoints_and_descriptors_stay_parallel() {
        let mut img = GrayImage::new(64, 64);
        paint_pattern(&mut img, 32.0, 32.0, 0.0);

        let mut kps = KeyPoints::new();
        kps.push(KeyPoint::new(32.0, 32.0).with_size(10.0));
        // Too close to the border; must be dropped.
        kps.push(KeyPoint::new(2.0, 2.0).with_size(10.0));

        let (kept, descriptors) = extract_descriptors(&img, &kps);
        assert_eq!(kept.len(), descriptors.len());
        assert_eq!(kept.len(), 1);
        assert_eq!(descriptors.dim(), DESCRIPTOR_DIM);
    }

    #[test]
    fn descriptor_is_unit_length() {
        let mut img = GrayImage::new(64, 64);
        paint_pattern(&mut img, 32.0, 32.0, 0.5);

        let mut kps = KeyPoints::new();
        kps.push(KeyPoint::new(32.0, 32.0).with_size(10.0));
        let (_, descriptors) = extract_descriptors(&img, &kps);
        let norm = descriptors.row(0).iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn flat_window_yields_no_descriptor() {
        let img = GrayImage::from_pixel(64, 64, Luma([80]));
        let mut kps = KeyPoints::new();
        kps.push(KeyPoint::new(32.0, 32.0).with_size(10.0));
        let (kept, descriptors) = extract_descriptors(&img, &kps);
        assert!(kept.is_empty());
        assert!(descriptors.is_empty());
    }

    #[test]
    fn descriptor_is_rotation_invariant() {
        // The same pattern painted upright and rotated by 40 degrees; with
        // the keypoint angle tracking the pattern the descriptors must agree
        // far more closely than against an unrelated pattern.
        let rot = 40f64.to_radians();

        let mut img_a = GrayImage::new(96, 96);
        paint_pattern(&mut img_a, 48.0, 48.0, 0.0);
        let mut img_b = GrayImage::new(96, 96);
        paint_pattern(&mut img_b, 48.0, 48.0, rot);

        let mut kps_a = KeyPoints::new();
        kps_a.push(KeyPoint::new(48.0, 48.0).with_size(10.0).with_angle(0.0));
        let mut kps_b = KeyPoints::new();
        kps_b.push(
            KeyPoint::new(48.0, 48.0)
                .with_size(10.0)
                .with_angle(rot.to_degrees()),
        );

        let (_, desc_a) = extract_descriptors(&img_a, &kps_a);
        let (_, desc_b) = extract_descriptors(&img_b, &kps_b);
        assert_eq!(desc_a.len(), 1);
        assert_eq!(desc_b.len(), 1);

        let aligned = euclidean_distance(desc_a.row(0), desc_b.row(0));

        let mut img_c = GrayImage::new(96, 96);
        paint_pattern(&mut img_c, 48.0, 48.0, 2.5);
        let mut kps_c = KeyPoints::new();
        kps_c.push(KeyPoint::new(48.0, 48.0).with_size(10.0).with_angle(0.0));
        let (_, desc_c) = extract_descriptors(&img_c, &kps_c);
        let misaligned = euclidean_distance(desc_a.row(0), desc_c.row(0));

        assert!(
            aligned < misaligned,
            "aligned {aligned} should beat misaligned {misaligned}"
        );
    }
}
