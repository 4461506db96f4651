use crate::{FeatureError, Result};
use pano_core::{euclidean_distance, Descriptors, FeatureMatch, Matches};
use rayon::prelude::*;

/// Ratio the pipeline runs with; keeps only sharply unambiguous matches.
/// 0.9 is the permissive alternative for feature-poor scenes.
pub const DEFAULT_RATIO: f32 = 0.5;

/// Brute-force nearest-neighbor matching with Lowe's ratio test.
///
/// For every query descriptor the two nearest train descriptors are found by
/// Euclidean distance; the best is kept only when
/// `distance(best) < ratio * distance(second_best)`. Matching is asymmetric
/// (query to train only) and each query yields at most one match. An empty
/// set on either side yields an empty result.
pub fn match_descriptors(query: &Descriptors, train: &Descriptors, ratio: f32) -> Result<Matches> {
    if query.is_empty() || train.is_empty() {
        return Ok(Matches::new());
    }
    if query.dim() != train.dim() {
        return Err(FeatureError::DimensionMismatch {
            query: query.dim(),
            train: train.dim(),
        });
    }

    let found: Vec<FeatureMatch> = (0..query.len())
        .into_par_iter()
        .filter_map(|query_idx| {
            let q = query.row(query_idx);

            let mut best: Option<(usize, f32)> = None;
            let mut second_best: Option<f32> = None;

            for (train_idx, t) in train.iter().enumerate() {
                let distance = euclidean_distance(q, t);
                match best {
                    None => best = Some((train_idx, distance)),
                    Some((_, best_dist)) => {
                        if distance < best_dist {
                            second_best = Some(best_dist);
                            best = Some((train_idx, distance));
                        } else if second_best.map_or(true, |s| distance < s) {
                            second_best = Some(distance);
                        }
                    }
                }
            }

            let (train_idx, distance) = best?;
            match second_best {
                Some(second) if distance >= ratio * second => None,
                _ => Some(FeatureMatch::new(query_idx, train_idx, distance)),
            }
        })
        .collect();

    let mut matches = Matches::with_capacity(found.len());
    for m in found {
        matches.push(m);
    }
    Ok(matches)
}
