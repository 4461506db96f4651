pub mod compositor;
pub mod homography;
pub mod pipeline;

pub use compositor::*;
pub use homography::*;
pub use pipeline::*;

use pano_features::FeatureError;

pub type Result<T> = std::result::Result<T, StitchError>;

/// Failure taxonomy of a pairwise stitch. A stitch either fully succeeds or
/// fails with one of these; nothing downstream substitutes defaults for an
/// undefined result.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("insufficient features in image {image}: found {found}, need at least {needed}")]
    InsufficientFeatures {
        image: usize,
        found: usize,
        needed: usize,
    },

    #[error("insufficient matches: found {found}, need at least 4")]
    InsufficientMatches { found: usize },

    #[error("degenerate homography")]
    DegenerateHomography,

    #[error("malformed canvas: {width}x{height}")]
    MalformedCanvas { width: i64, height: i64 },

    #[error("invalid stitch graph: {0}")]
    InvalidGraph(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}
