//! Pairwise stitching and the multi-image coordinator.
//!
//! Multi-image composition is an explicit DAG: every stitch node names its
//! two sources (a raw image or an earlier node), so evaluation order is the
//! declared dependency order and independent nodes can run concurrently.

use crate::compositor::{composite, Composite};
use crate::homography::estimate_homography;
use crate::{Result, StitchError};
use image::RgbImage;
use pano_core::robust::RobustConfig;
use pano_features::{extract_with, match_descriptors, Detector, DetectorParams, DEFAULT_RATIO};
use pano_imgproc::rgb_to_gray;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

/// One configuration surface for every stage of a stitch; call sites never
/// diverge silently from library defaults.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Lowe ratio-test threshold in (0, 1].
    pub ratio: f32,
    pub ransac: RobustConfig,
    pub detector: DetectorParams,
    /// Fewer keypoints than this in either image fails the stitch.
    pub min_features: usize,
    /// Seeds the per-node RANSAC sampling; fixed seed, fixed result.
    pub seed: u64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            ransac: RobustConfig::default(),
            detector: DetectorParams::default(),
            min_features: 4,
            seed: 0,
        }
    }
}

/// Stitch one pair: detect and describe both images, match, estimate the
/// homography mapping `image_a` onto `image_b`, then composite. Fails
/// explicitly; no stage substitutes defaults for undefined results.
pub fn stitch_pair(
    image_a: &RgbImage,
    image_b: &RgbImage,
    config: &StitchConfig,
    rng: &mut impl Rng,
) -> Result<Composite> {
    let detector = Detector::with_params(config.detector.clone());

    let (keypoints_a, descriptors_a) = extract_with(&rgb_to_gray(image_a), &detector);
    if keypoints_a.len() < config.min_features {
        return Err(StitchError::InsufficientFeatures {
            image: 0,
            found: keypoints_a.len(),
            needed: config.min_features,
        });
    }

    let (keypoints_b, descriptors_b) = extract_with(&rgb_to_gray(image_b), &detector);
    if keypoints_b.len() < config.min_features {
        return Err(StitchError::InsufficientFeatures {
            image: 1,
            found: keypoints_b.len(),
            needed: config.min_features,
        });
    }

    let matches = match_descriptors(&descriptors_a, &descriptors_b, config.ratio)?;
    debug!(
        features_a = keypoints_a.len(),
        features_b = keypoints_b.len(),
        matches = matches.len(),
        "matched descriptors"
    );

    let estimate = estimate_homography(&keypoints_a, &keypoints_b, &matches, &config.ransac, rng)?;
    debug!(
        num_inliers = estimate.num_inliers,
        residual = estimate.residual,
        "homography estimated"
    );

    composite(image_a, image_b, &estimate.matrix)
}

/// Where a stitch node reads each of its two inputs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchSource {
    /// One of the raw input images.
    Image(usize),
    /// The composite produced by an earlier node.
    Node(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct StitchNode {
    pub left: StitchSource,
    pub right: StitchSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Dependency graph of pairwise stitches over a fixed set of input images.
/// Node sources must already exist when a node is added, so the graph is
/// acyclic by construction and node order is a valid evaluation order.
pub struct StitchGraph {
    n_images: usize,
    nodes: Vec<StitchNode>,
}

impl StitchGraph {
    pub fn new(n_images: usize) -> Self {
        Self {
            n_images,
            nodes: Vec::new(),
        }
    }

    pub fn add_stitch(&mut self, left: StitchSource, right: StitchSource) -> Result<NodeId> {
        for source in [left, right] {
            match source {
                StitchSource::Image(i) if i >= self.n_images => {
                    return Err(StitchError::InvalidGraph(format!(
                        "image index {i} out of range (have {})",
                        self.n_images
                    )));
                }
                StitchSource::Node(j) if j >= self.nodes.len() => {
                    return Err(StitchError::InvalidGraph(format!(
                        "node {j} does not exist yet; sources must precede consumers"
                    )));
                }
                _ => {}
            }
        }
        self.nodes.push(StitchNode { left, right });
        Ok(NodeId(self.nodes.len() - 1))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Dependency depth per node: 1 + the deepest source, raw images being
    /// depth 0. Nodes sharing a level are independent of each other.
    pub fn levels(&self) -> Vec<usize> {
        let mut levels = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let depth = |source: StitchSource| match source {
                StitchSource::Image(_) => 0,
                StitchSource::Node(j) => levels[j],
            };
            levels.push(1 + depth(node.left).max(depth(node.right)));
        }
        levels
    }

    /// Node ids grouped by level, shallowest first; each group may be
    /// evaluated concurrently once the previous groups are done.
    pub fn parallelizable_groups(&self) -> Vec<Vec<NodeId>> {
        let levels = self.levels();
        let max_level = levels.iter().copied().max().unwrap_or(0);
        (1..=max_level)
            .map(|level| {
                levels
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &l)| (l == level).then_some(NodeId(i)))
                    .collect()
            })
            .collect()
    }

    /// Evaluate every node in declaration order and return the final node's
    /// composite. A failed node aborts the run; nothing depending on it is
    /// attempted.
    pub fn run(&self, images: &[RgbImage], config: &StitchConfig) -> Result<Composite> {
        self.check_inputs(images)?;

        let mut results: Vec<Option<Composite>> = vec![None; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            debug!(node = idx, "stitching node");
            let result = self.eval_node(idx, node, images, &results, config);
            match result {
                Ok(c) => results[idx] = Some(c),
                Err(e) => {
                    debug!(node = idx, error = %e, "stitch node failed");
                    return Err(e);
                }
            }
        }

        let last = results.pop().flatten().expect("graph checked non-empty");
        info!(
            width = last.image.width(),
            height = last.image.height(),
            nodes = self.nodes.len(),
            "stitch graph complete"
        );
        Ok(last)
    }

    /// Like [`run`](Self::run), but nodes on the same dependency level are
    /// evaluated concurrently. Identical results, seed included.
    pub fn run_parallel(&self, images: &[RgbImage], config: &StitchConfig) -> Result<Composite> {
        self.check_inputs(images)?;

        let mut results: Vec<Option<Composite>> = vec![None; self.nodes.len()];
        for group in self.parallelizable_groups() {
            let evaluated: Vec<(usize, Result<Composite>)> = group
                .par_iter()
                .map(|&NodeId(idx)| {
                    debug!(node = idx, "stitching node");
                    (
                        idx,
                        self.eval_node(idx, &self.nodes[idx], images, &results, config),
                    )
                })
                .collect();

            for (idx, result) in evaluated {
                match result {
                    Ok(c) => results[idx] = Some(c),
                    Err(e) => {
                        debug!(node = idx, error = %e, "stitch node failed");
                        return Err(e);
                    }
                }
            }
        }

        let last = results.pop().flatten().expect("graph checked non-empty");
        info!(
            width = last.image.width(),
            height = last.image.height(),
            nodes = self.nodes.len(),
            "stitch graph complete"
        );
        Ok(last)
    }

    fn check_inputs(&self, images: &[RgbImage]) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(StitchError::InvalidGraph("graph has no stitch nodes".into()));
        }
        if images.len() < self.n_images {
            return Err(StitchError::InvalidGraph(format!(
                "graph declares {} input images, got {}",
                self.n_images,
                images.len()
            )));
        }
        Ok(())
    }

    fn eval_node(
        &self,
        idx: usize,
        node: &StitchNode,
        images: &[RgbImage],
        results: &[Option<Composite>],
        config: &StitchConfig,
    ) -> Result<Composite> {
        let left = resolve_source(node.left, images, results);
        let right = resolve_source(node.right, images, results);
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(idx as u64));
        stitch_pair(left, right, config, &mut rng)
    }
}

fn resolve_source<'a>(
    source: StitchSource,
    images: &'a [RgbImage],
    results: &'a [Option<Composite>],
) -> &'a RgbImage {
    match source {
        StitchSource::Image(i) => &images[i],
        StitchSource::Node(j) => {
            &results[j]
                .as_ref()
                .expect("sources precede consumers")
                .image
        }
    }
}

/// The original four-image chain: A with B, C with D, then the two partial
/// panoramas together.
pub fn stitch_four(images: &[RgbImage; 4], config: &StitchConfig) -> Result<Composite> {
    let mut graph = StitchGraph::new(4);
    let ab = graph.add_stitch(StitchSource::Image(0), StitchSource::Image(1))?;
    let cd = graph.add_stitch(StitchSource::Image(2), StitchSource::Image(3))?;
    graph.add_stitch(StitchSource::Node(ab.0), StitchSource::Node(cd.0))?;
    graph.run_parallel(images.as_slice(), config)
}
