use crate::pyramid::{build_pyramid, Pyramid};
use image::GrayImage;
use pano_core::{KeyPoint, KeyPoints};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct DetectorParams {
    /// Retain at most this many keypoints, strongest first.
    pub n_features: usize,
    pub n_octaves: usize,
    /// Pyramid smoothing per octave.
    pub sigma: f32,
    /// Harris window half-extent is `block_size / 2`.
    pub block_size: i32,
    pub harris_k: f64,
    /// Corner acceptance threshold relative to the strongest response in the
    /// octave, so detection survives global intensity changes.
    pub quality_level: f64,
    /// Descriptor window half-extent at octave 0; doubles per octave.
    pub patch_size: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            n_octaves: 3,
            sigma: 1.2,
            block_size: 3,
            harris_k: 0.04,
            quality_level: 0.01,
            patch_size: 12.0,
        }
    }
}

/// Multi-octave Harris corner detector with intensity-centroid orientation.
pub struct Detector {
    params: DetectorParams,
}

impl Detector {
    pub fn new() -> Self {
        Self {
            params: DetectorParams::default(),
        }
    }

    pub fn with_params(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn with_n_features(mut self, n: usize) -> Self {
        self.params.n_features = n;
        self
    }

    pub fn with_n_octaves(mut self, n: usize) -> Self {
        self.params.n_octaves = n;
        self
    }

    pub fn with_quality_level(mut self, quality: f64) -> Self {
        self.params.quality_level = quality;
        self
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Detect oriented multi-scale keypoints in base-image coordinates.
    /// Degenerate input (uniform, too small) yields an empty set.
    pub fn detect(&self, image: &GrayImage) -> KeyPoints {
        let pyramid = build_pyramid(image, self.params.n_octaves, self.params.sigma);

        let mut all = Vec::new();
        for (octave, level) in pyramid.octaves.iter().enumerate() {
            let found = harris_detect(
                level,
                self.params.block_size,
                self.params.harris_k,
                self.params.quality_level,
            );
            let scale = Pyramid::scale(octave);
            for kp in found.keypoints {
                all.push(
                    KeyPoint::new(kp.x * scale, kp.y * scale)
                        .with_size(self.params.patch_size * scale)
                        .with_octave(octave as i32)
                        .with_response(kp.response),
                );
            }
        }

        all.sort_by(|a, b| {
            b.response
                .partial_cmp(&a.response)
                .unwrap_or(Ordering::Equal)
        });
        all.truncate(self.params.n_features);

        let mut keypoints = KeyPoints { keypoints: all };
        self.compute_orientations(image, &mut keypoints);
        keypoints
    }

    /// Assign each keypoint the direction of its intensity centroid, computed
    /// over a circular size-scaled window so the angle itself is
    /// rotation-stable.
    pub fn compute_orientations(&self, image: &GrayImage, keypoints: &mut KeyPoints) {
        let width = image.width() as i32;
        let height = image.height() as i32;

        for kp in &mut keypoints.keypoints {
            let cx = kp.x as i32;
            let cy = kp.y as i32;
            let radius = kp.size.round() as i32;
            let r2 = radius * radius;

            let mut m01 = 0.0f64;
            let mut m10 = 0.0f64;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx * dx + dy * dy > r2 {
                        continue;
                    }
                    let px = cx + dx;
                    let py = cy + dy;
                    if px < 0 || px >= width || py < 0 || py >= height {
                        continue;
                    }
                    let intensity = image.get_pixel(px as u32, py as u32)[0] as f64;
                    m01 += intensity * dy as f64;
                    m10 += intensity * dx as f64;
                }
            }

            kp.angle = m01.atan2(m10).to_degrees();
        }
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

/// Harris corner response with 3x3 non-maximum suppression. The acceptance
/// threshold is `quality_level` times the strongest response found.
pub fn harris_detect(image: &GrayImage, block_size: i32, k: f64, quality_level: f64) -> KeyPoints {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let half_block = block_size / 2;
    let mut keypoints = KeyPoints::new();

    if width < block_size + 2 || height < block_size + 2 {
        return keypoints;
    }

    let ix = compute_sobel_x(image);
    let iy = compute_sobel_y(image);

    let mut responses = vec![0.0f64; (width * height) as usize];
    let mut max_response = 0.0f64;

    for y in half_block..height - half_block {
        for x in half_block..width - half_block {
            let mut i_xx = 0.0f64;
            let mut i_yy = 0.0f64;
            let mut i_xy = 0.0f64;

            for by in -half_block..=half_block {
                for bx in -half_block..=half_block {
                    let idx = ((y + by) * width + (x + bx)) as usize;
                    let gx = ix[idx] as f64;
                    let gy = iy[idx] as f64;

                    i_xx += gx * gx;
                    i_yy += gy * gy;
                    i_xy += gx * gy;
                }
            }

            let det = i_xx * i_yy - i_xy * i_xy;
            let trace = i_xx + i_yy;
            let response = det - k * trace * trace;

            responses[(y * width + x) as usize] = response;
            if response > max_response {
                max_response = response;
            }
        }
    }

    if max_response <= 0.0 {
        return keypoints;
    }
    let threshold = quality_level * max_response;

    for y in (half_block + 1)..(height - half_block - 1) {
        for x in (half_block + 1)..(width - half_block - 1) {
            let idx = (y * width + x) as usize;
            let response = responses[idx];

            if response <= threshold {
                continue;
            }

            let mut is_max = true;
            'nms: for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nidx = ((y + dy) * width + (x + dx)) as usize;
                    if responses[nidx] > response {
                        is_max = false;
                        break 'nms;
                    }
                }
            }

            if is_max {
                keypoints.push(KeyPoint::new(x as f64, y as f64).with_response(response));
            }
        }
    }

    keypoints
}

fn compute_sobel_x(image: &GrayImage) -> Vec<i16> {
    sobel(image, &[-1, 0, 1, -2, 0, 2, -1, 0, 1])
}

fn compute_sobel_y(image: &GrayImage) -> Vec<i16> {
    sobel(image, &[-1, -2, -1, 0, 0, 0, 1, 2, 1])
}

fn sobel(image: &GrayImage, kernel: &[i32; 9]) -> Vec<i16> {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let raw = image.as_raw();
    let mut result = vec![0i16; (width * height) as usize];

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum = 0i32;
            for ky in 0..3 {
                for kx in 0..3 {
                    let px = x + kx - 1;
                    let py = y + ky - 1;
                    let val = raw[(py * width + px) as usize] as i32;
                    sum += val * kernel[(ky * 3 + kx) as usize];
                }
            }
            result[(y * width + x) as usize] = sum.clamp(-32768, 32767) as i16;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square_image() -> GrayImage {
        let mut img = GrayImage::new(64, 64);
        for y in 16..48 {
            for x in 16..48 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        img
    }

    #[test]
    fn harris_finds_square_corners() {
        let img = square_image();
        let kps = harris_detect(&img, 3, 0.04, 0.01);
        assert!(!kps.is_empty());

        let near = |kp: &KeyPoint, x: f64, y: f64| (kp.x - x).abs() < 3.0 && (kp.y - y).abs() < 3.0;
        assert!(kps.iter().any(|kp| near(kp, 16.0, 16.0)));
        assert!(kps.iter().any(|kp| near(kp, 47.0, 47.0)));
    }

    #[test]
    fn uniform_image_has_no_keypoints() {
        let img = GrayImage::from_pixel(64, 64, Luma([128]));
        let kps = Detector::new().detect(&img);
        assert!(kps.is_empty());
    }

    #[test]
    fn tiny_image_has_no_keypoints() {
        let img = GrayImage::new(4, 4);
        let kps = Detector::new().detect(&img);
        assert!(kps.is_empty());
    }

    #[test]
    fn detect_respects_feature_budget() {
        let img = square_image();
        let kps = Detector::new().with_n_features(2).detect(&img);
        assert!(kps.len() <= 2);
    }

    #[test]
    fn orientation_points_toward_bright_side() {
        // Bright half-plane to the right of the keypoint: the centroid and
        // therefore the angle must point along +x.
        let mut img = GrayImage::new(40, 40);
        for y in 0..40 {
            for x in 20..40 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let mut kps = KeyPoints::new();
        kps.push(KeyPoint::new(20.0, 20.0).with_size(8.0));
        Detector::new().compute_orientations(&img, &mut kps);
        let angle = kps.keypoints[0].angle;
        assert!(angle.abs() < 10.0, "angle was {angle}");
    }
}
