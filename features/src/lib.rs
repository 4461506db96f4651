pub mod descriptor;
pub mod detector;
pub mod matcher;
pub mod pyramid;

pub use descriptor::*;
pub use detector::*;
pub use matcher::*;
pub use pyramid::*;

use image::GrayImage;
use pano_core::{Descriptors, KeyPoints};

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("descriptor dimension mismatch: query {query}, train {train}")]
    DimensionMismatch { query: usize, train: usize },
}

/// Detect and describe in one call with default parameters. The returned
/// sets are parallel; degenerate input yields empty sets.
pub fn extract(image: &GrayImage) -> (KeyPoints, Descriptors) {
    extract_with(image, &Detector::new())
}

pub fn extract_with(image: &GrayImage, detector: &Detector) -> (KeyPoints, Descriptors) {
    let keypoints = detector.detect(image);
    extract_descriptors(image, &keypoints)
}
