//! Homography estimation from keypoint correspondences: direct linear
//! transform inside a RANSAC loop, refit over the winning inlier set.

use crate::{Result, StitchError};
use nalgebra::{DMatrix, Matrix3, Vector3};
use pano_core::robust::{Ransac, RobustConfig, RobustModel};
use pano_core::{KeyPoints, Matches};
use rand::Rng;

/// A source/target point correspondence in pixel coordinates.
#[derive(Clone, Debug)]
pub struct PointPair {
    pub src: (f64, f64),
    pub dst: (f64, f64),
}

pub struct HomographyModel;

impl RobustModel<PointPair> for HomographyModel {
    type Model = Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        4
    }

    /// Duplicate points or three collinear points on either side leave the
    /// DLT system rank-deficient; such samples are skipped and redrawn.
    fn is_degenerate_sample(&self, data: &[&PointPair]) -> bool {
        if data.len() != 4 {
            return false;
        }
        let src: Vec<(f64, f64)> = data.iter().map(|p| p.src).collect();
        let dst: Vec<(f64, f64)> = data.iter().map(|p| p.dst).collect();
        has_degenerate_triple(&src) || has_degenerate_triple(&dst)
    }

    fn estimate(&self, data: &[&PointPair]) -> Option<Self::Model> {
        if data.len() < 4 {
            return None;
        }
        let mut a = vec![0.0f64; data.len() * 2 * 9];
        for (i, m) in data.iter().enumerate() {
            let (x1, y1) = m.src;
            let (x2, y2) = m.dst;
            let row1 = i * 2;
            let row2 = i * 2 + 1;
            a[row1 * 9] = -x1;
            a[row1 * 9 + 1] = -y1;
            a[row1 * 9 + 2] = -1.0;
            a[row1 * 9 + 6] = x2 * x1;
            a[row1 * 9 + 7] = x2 * y1;
            a[row1 * 9 + 8] = x2;
            a[row2 * 9 + 3] = -x1;
            a[row2 * 9 + 4] = -y1;
            a[row2 * 9 + 5] = -1.0;
            a[row2 * 9 + 6] = y2 * x1;
            a[row2 * 9 + 7] = y2 * y1;
            a[row2 * 9 + 8] = y2;
        }
        solve_dlt(&a, data.len() * 2)
    }

    fn compute_error(&self, model: &Self::Model, data: &PointPair) -> f64 {
        let p1 = Vector3::new(data.src.0, data.src.1, 1.0);
        let p2_pred = model * p1;
        if p2_pred[2].abs() > 1e-10 {
            let x2_pred = p2_pred[0] / p2_pred[2];
            let y2_pred = p2_pred[1] / p2_pred[2];
            ((x2_pred - data.dst.0).powi(2) + (y2_pred - data.dst.1).powi(2)).sqrt()
        } else {
            f64::INFINITY
        }
    }
}

fn has_degenerate_triple(pts: &[(f64, f64)]) -> bool {
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            for k in (j + 1)..pts.len() {
                let (ax, ay) = pts[i];
                let (bx, by) = pts[j];
                let (cx, cy) = pts[k];
                let cross = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
                if cross.abs() < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}

/// Least-squares DLT solve: the homography is the right singular vector for
/// the smallest singular value of the stacked constraint matrix.
fn solve_dlt(a: &[f64], n_rows: usize) -> Option<Matrix3<f64>> {
    let mut matrix = DMatrix::from_row_slice(n_rows, 9, a);

    // An 8-row minimal system yields only 8 singular vectors; pad so the
    // null-space vector is always row 8 of V^T.
    if n_rows < 9 {
        let mut padded = DMatrix::zeros(9, 9);
        padded.view_mut((0, 0), (n_rows, 9)).copy_from(&matrix);
        matrix = padded;
    }

    let svd = matrix.svd(false, true);
    let v_t = svd.v_t?;
    let h = v_t.row(8);

    Some(Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8],
    ))
}

/// Outcome of a successful estimation: the normalized matrix plus the inlier
/// accounting of the robust fit.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub matrix: Matrix3<f64>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
}

/// Estimate the homography mapping keypoints of the first image onto their
/// matched keypoints in the second.
///
/// Needs at least 4 matches. The winning RANSAC candidate is refit over all
/// of its inliers and the returned matrix is normalized so `h[(2,2)] == 1`.
pub fn estimate_homography(
    keypoints_a: &KeyPoints,
    keypoints_b: &KeyPoints,
    matches: &Matches,
    config: &RobustConfig,
    rng: &mut impl Rng,
) -> Result<HomographyEstimate> {
    if matches.len() < 4 {
        return Err(StitchError::InsufficientMatches {
            found: matches.len(),
        });
    }

    let data: Vec<PointPair> = matches
        .iter()
        .map(|m| {
            let ka = &keypoints_a.keypoints[m.query_idx];
            let kb = &keypoints_b.keypoints[m.train_idx];
            PointPair {
                src: (ka.x, ka.y),
                dst: (kb.x, kb.y),
            }
        })
        .collect();

    let ransac = Ransac::new(config.clone());
    let result = ransac.run(&HomographyModel, &data, rng);

    let Some(matrix) = result.model else {
        return Err(StitchError::DegenerateHomography);
    };

    let h22 = matrix[(2, 2)];
    if h22.abs() < 1e-12 || matrix.determinant().abs() < 1e-12 {
        return Err(StitchError::DegenerateHomography);
    }

    Ok(HomographyEstimate {
        matrix: matrix / h22,
        inliers: result.inliers,
        num_inliers: result.num_inliers,
        residual: result.residual,
    })
}
