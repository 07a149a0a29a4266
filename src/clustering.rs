//! Adaptive k-means clustering of condition embeddings.
//!
//! The cluster count is picked with the elbow heuristic over a small range
//! of candidate k derived from the number of points. All randomness flows
//! from one seeded `StdRng`, so identical input yields identical labels.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

// ---------------------------------------------------------------------
//  Config
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Upper bound on candidate k.
    pub max_clusters: usize,
    /// Accepted for callers but not enforced: clusters may exceed it.
    pub max_cluster_size: usize,
    pub seed: u64,
    /// Independent k-means++ restarts per fit; the lowest inertia wins.
    pub restarts: usize,
    pub max_iterations: usize,
    /// Stop Lloyd iterations once the summed squared centroid shift is at
    /// or below this value.
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_clusters: 20,
            max_cluster_size: 30,
            seed: 42,
            restarts: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

// ---------------------------------------------------------------------
//  Adaptive clustering
// ---------------------------------------------------------------------

/// Candidate k range `[min_k, max_k]`, or `None` when there are too few
/// points for clustering to mean anything.
pub fn candidate_range(n: usize, max_clusters: usize) -> Option<(usize, usize)> {
    let min_k = (n / 10).max(2);
    let max_k = max_clusters.min(n / 5).min(n.saturating_sub(1));
    (max_k > min_k).then_some((min_k, max_k))
}

/// Assign a cluster id to every vector, in input order.
///
/// Fewer than two vectors, too few points for the candidate range, or
/// vectors of unequal length all yield the identity assignment
/// `[0, 1, ..., n-1]`.
pub fn cluster(vectors: &[Vec<f32>], config: &ClusterConfig) -> Vec<usize> {
    let n = vectors.len();
    let identity: Vec<usize> = (0..n).collect();
    if n < 2 {
        return identity;
    }

    let dim = vectors[0].len();
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        warn!(points = n, "embeddings have inconsistent dimensions; skipping clustering");
        return identity;
    }

    let Some((min_k, max_k)) = candidate_range(n, config.max_clusters) else {
        debug!(points = n, "too few points for clustering");
        return identity;
    };

    let data = DMatrix::from_fn(n, dim, |r, c| vectors[r][c] as f64);
    let kmeans = KMeans::from_config(config);

    let wcss: Vec<f64> = (min_k..=max_k)
        .map(|k| kmeans.fit(&data, k).inertia)
        .collect();
    let k = min_k + elbow_index(&wcss);
    debug!(points = n, min_k, max_k, k, ?wcss, "selected cluster count");

    kmeans.fit(&data, k).labels
}

/// Index of the largest single drop in WCSS, scanning interior points.
///
/// Two or fewer entries pick index 0. Ties keep the earliest index.
pub fn elbow_index(wcss: &[f64]) -> usize {
    if wcss.len() <= 2 {
        return 0;
    }
    let mut best = 0;
    let mut best_drop = f64::NEG_INFINITY;
    for i in 1..wcss.len() - 1 {
        let drop = wcss[i - 1] - wcss[i];
        if drop > best_drop {
            best_drop = drop;
            best = i;
        }
    }
    best
}

/// Bucket items by cluster label. Buckets are ordered by the first
/// appearance of their label; items keep input order within a bucket.
pub fn group_by_cluster<T>(items: Vec<T>, labels: &[usize]) -> Vec<Vec<T>> {
    let mut order: Vec<usize> = Vec::new();
    let mut buckets: Vec<Vec<T>> = Vec::new();
    for (item, &label) in items.into_iter().zip(labels) {
        match order.iter().position(|&l| l == label) {
            Some(idx) => buckets[idx].push(item),
            None => {
                order.push(label);
                buckets.push(vec![item]);
            }
        }
    }
    buckets
}

// ---------------------------------------------------------------------
//  K-means
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: DMatrix<f64>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
}

/// Lloyd's algorithm with k-means++ seeding. Points are matrix rows.
#[derive(Debug, Clone)]
pub struct KMeans {
    seed: u64,
    restarts: usize,
    max_iterations: usize,
    tolerance: f64,
}

impl KMeans {
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            seed: config.seed,
            restarts: config.restarts.max(1),
            max_iterations: config.max_iterations.max(1),
            tolerance: config.tolerance,
        }
    }

    /// Best of `restarts` runs. `k` is clamped to `[1, rows]`.
    pub fn fit(&self, data: &DMatrix<f64>, k: usize) -> KMeansFit {
        let k = k.clamp(1, data.nrows().max(1));
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;
        for _ in 0..self.restarts {
            let fit = self.run_once(data, k, &mut rng);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.unwrap_or_else(|| self.run_once(data, k, &mut rng))
    }

    fn run_once(&self, data: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> KMeansFit {
        let n = data.nrows();
        let mut centroids = seed_plus_plus(data, k, rng);
        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iterations {
            assign(data, &centroids, &mut labels);

            let mut sums = DMatrix::<f64>::zeros(k, data.ncols());
            let mut counts = vec![0usize; k];
            for (i, &label) in labels.iter().enumerate() {
                let mut row = sums.row_mut(label);
                row += data.row(i);
                counts[label] += 1;
            }

            let mut shift = 0.0;
            for c in 0..k {
                // An empty cluster keeps its previous centroid.
                if counts[c] == 0 {
                    continue;
                }
                let mean = sums.row(c) / counts[c] as f64;
                shift += (&mean - centroids.row(c)).norm_squared();
                centroids.row_mut(c).copy_from(&mean);
            }

            if shift <= self.tolerance {
                break;
            }
        }

        let inertia = assign(data, &centroids, &mut labels);
        KMeansFit {
            labels,
            centroids,
            inertia,
        }
    }
}

fn squared_distance(data: &DMatrix<f64>, row: usize, centroids: &DMatrix<f64>, c: usize) -> f64 {
    (data.row(row) - centroids.row(c)).norm_squared()
}

/// Nearest-centroid assignment; returns the inertia.
fn assign(data: &DMatrix<f64>, centroids: &DMatrix<f64>, labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (i, label) in labels.iter_mut().enumerate() {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for c in 0..centroids.nrows() {
            let d = squared_distance(data, i, centroids, c);
            if d < best_d {
                best_d = d;
                best = c;
            }
        }
        *label = best;
        inertia += best_d;
    }
    inertia
}

/// k-means++: first center uniform, the rest sampled proportional to the
/// squared distance from the nearest chosen center.
fn seed_plus_plus(data: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> DMatrix<f64> {
    let n = data.nrows();
    let mut chosen: Vec<usize> = vec![rng.gen_range(0..n)];
    let mut nearest: Vec<f64> = (0..n)
        .map(|i| (data.row(i) - data.row(chosen[0])).norm_squared())
        .collect();

    while chosen.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = n - 1;
            for (i, d) in nearest.iter().enumerate() {
                acc += d;
                if acc >= target && *d > 0.0 {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            // Every point coincides with a center already.
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(next);
        for (i, d) in nearest.iter_mut().enumerate() {
            let candidate = (data.row(i) - data.row(next)).norm_squared();
            if candidate < *d {
                *d = candidate;
            }
        }
    }

    let mut centroids = DMatrix::<f64>::zeros(k, data.ncols());
    for (c, &idx) in chosen.iter().enumerate() {
        centroids.row_mut(c).copy_from(&data.row(idx));
    }
    centroids
}
