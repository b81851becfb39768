//! Anomaly scoring for run-level KPI vectors
//!
//! Judges whether a run's `(latency_p95_ms, cache_miss_mean, error_rate)`
//! vector is statistically unusual. In a real silicon flow the reference
//! model would be trained on historical golden runs; here the baseline is
//! synthesized on the fly as a Gaussian neighborhood around the vector
//! under test, and an isolation forest fitted to that neighborhood scores
//! the vector's outlier-ness. An acknowledged simplification, kept as-is.
//!
//! Scores follow the decision-function convention: lower means more
//! anomalous, and negative means past the contamination threshold.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::analyzer::percentile;
use crate::config::AnomalyConfig;

/// Number of points in the "healthy" neighborhood cluster
const CLUSTER_A_SIZE: usize = 250;

/// Number of points in the offset "degraded" neighborhood cluster
const CLUSTER_B_SIZE: usize = 80;

/// Per-dimension noise standard deviations for the healthy cluster
const CLUSTER_A_STDDEV: [f64; 3] = [2.0, 0.01, 0.002];

/// Per-dimension noise standard deviations for the degraded cluster
const CLUSTER_B_STDDEV: [f64; 3] = [3.0, 0.015, 0.004];

/// Mean offset of the degraded cluster from the vector under test
const CLUSTER_B_OFFSET: [f64; 3] = [6.0, 0.03, 0.006];

/// Ensemble size for the isolation forest
const TREE_COUNT: usize = 250;

/// Per-tree subsample size
const SUBSAMPLE_SIZE: usize = 256;

/// Euler-Mascheroni constant, used in the average path length term
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Outcome of scoring one KPI vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Decision-function score; lower = more anomalous
    pub anomaly_score: f64,

    /// True iff the vector falls past the contamination threshold
    pub is_anomalous: bool,
}

/// Scorer for 3-dimensional KPI vectors.
///
/// Construction captures the contamination and seed from an immutable
/// configuration snapshot. With the default fixed seed, identical input
/// vectors produce identical results; configuring `seed = None` opts into
/// entropy seeding and call-to-call nondeterminism.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    contamination: f64,
    seed: Option<u64>,
}

impl AnomalyScorer {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            contamination: config.contamination,
            seed: config.seed,
        }
    }

    /// Score one KPI vector against a freshly synthesized neighborhood.
    pub fn score(&self, vector: [f64; 3]) -> AnomalyResult {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let baseline = synthesize_neighborhood(vector, &mut rng);
        let forest = IsolationForest::fit(&baseline, TREE_COUNT, SUBSAMPLE_SIZE, &mut rng);

        // The contamination quantile of the training scores becomes the
        // anomaly/normal decision boundary.
        let mut train_scores: Vec<f64> =
            baseline.iter().map(|p| forest.score_sample(p)).collect();
        train_scores.sort_by(|a, b| a.total_cmp(b));
        let offset = percentile(&train_scores, self.contamination * 100.0);

        let anomaly_score = forest.score_sample(&vector) - offset;

        AnomalyResult {
            anomaly_score,
            is_anomalous: anomaly_score < 0.0,
        }
    }
}

/// Build the two-cluster Gaussian reference neighborhood around `center`.
fn synthesize_neighborhood(center: [f64; 3], rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut points = Vec::with_capacity(CLUSTER_A_SIZE + CLUSTER_B_SIZE);

    for _ in 0..CLUSTER_A_SIZE {
        points.push(perturb(center, [0.0; 3], CLUSTER_A_STDDEV, rng));
    }
    for _ in 0..CLUSTER_B_SIZE {
        points.push(perturb(center, CLUSTER_B_OFFSET, CLUSTER_B_STDDEV, rng));
    }

    points
}

fn perturb(center: [f64; 3], offset: [f64; 3], stddev: [f64; 3], rng: &mut StdRng) -> [f64; 3] {
    let mut point = [0.0; 3];
    for dim in 0..3 {
        let normal =
            Normal::new(center[dim] + offset[dim], stddev[dim]).expect("stddev is positive");
        point[dim] = normal.sample(rng);
    }
    point
}

/// One node of an isolation tree, stored in a flat arena
#[derive(Debug)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// A single randomized partitioning tree
#[derive(Debug)]
struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    fn build(data: &[[f64; 3]], indices: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        Self::grow(data, indices, 0, max_depth, rng, &mut nodes);
        Self { nodes }
    }

    /// Recursively grow the tree, returning the index of the created node.
    fn grow(
        data: &[[f64; 3]],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        if depth >= max_depth || indices.len() <= 1 {
            nodes.push(TreeNode::Leaf {
                size: indices.len(),
            });
            return nodes.len() - 1;
        }

        // Split on a random feature that still has spread; if every
        // feature is constant over this partition, the points are
        // indistinguishable and become one leaf.
        let mut candidates = Vec::new();
        for feature in 0..3 {
            let (min, max) = feature_range(data, indices, feature);
            if max > min {
                candidates.push((feature, min, max));
            }
        }

        if candidates.is_empty() {
            nodes.push(TreeNode::Leaf {
                size: indices.len(),
            });
            return nodes.len() - 1;
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| data[i][feature] < threshold);

        // Reserve the slot so child indices are stable while recursing.
        let node_index = nodes.len();
        nodes.push(TreeNode::Leaf { size: 0 });

        let left = Self::grow(data, &left_idx, depth + 1, max_depth, rng, nodes);
        let right = Self::grow(data, &right_idx, depth + 1, max_depth, rng, nodes);

        nodes[node_index] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_index
    }

    /// Path length to isolate `point`, with the standard unbuilt-subtree
    /// adjustment at leaves holding more than one sample.
    fn path_length(&self, point: &[f64; 3]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;

        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { size } => return depth + average_path_length(*size),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn feature_range(data: &[[f64; 3]], indices: &[usize], feature: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        let v = data[i][feature];
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}

/// Expected path length of an unsuccessful BST search over `n` points;
/// normalizes raw path lengths into comparable anomaly scores.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Ensemble of isolation trees fitted to a reference point set
#[derive(Debug)]
struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
}

impl IsolationForest {
    fn fit(data: &[[f64; 3]], tree_count: usize, subsample_size: usize, rng: &mut StdRng) -> Self {
        let subsample_size = subsample_size.min(data.len());
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        let trees = (0..tree_count)
            .map(|_| {
                let indices = rand::seq::index::sample(rng, data.len(), subsample_size).into_vec();
                IsolationTree::build(data, &indices, max_depth, rng)
            })
            .collect();

        Self {
            trees,
            subsample_size,
        }
    }

    /// Decision-function style score: `-2^(-E[h(x)] / c(psi))`, in (-1, 0).
    /// Shorter average isolation path = more anomalous = lower score.
    fn score_sample(&self, point: &[f64; 3]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(point)).sum();
        let mean_path = total / self.trees.len() as f64;
        let normalizer = average_path_length(self.subsample_size);

        -(2.0f64.powf(-mean_path / normalizer))
    }
}
