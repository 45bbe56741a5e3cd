//! K-means clustering with k-means++ seeding.

use super::finite_rows;
use crate::config::{
    ConfigValidationError, DEFAULT_MAX_ITERATIONS, DEFAULT_SEED, MAX_CLUSTERS, MIN_CLUSTERS,
};
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use rand::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

/// Centroid shift below which Lloyd iterations stop.
const TOLERANCE: f64 = 1e-4;

/// Cluster label per row, aligned by row index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    /// Label in `[0, k)` for each row. Row 0 always has label 0 and new
    /// labels are numbered in order of first appearance.
    pub labels: Vec<usize>,
    pub k: usize,
    /// Centroid of each label, over the dataset's columns.
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each row to its centroid.
    pub inertia: f64,
    pub iterations: usize,
    /// False when the iteration cap was reached first.
    pub converged: bool,
}

impl ClusterAssignment {
    /// Number of rows per label.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Labels as `f64`, ready to append to a dataset.
    pub fn labels_as_f64(&self) -> Vec<f64> {
        self.labels.iter().map(|&label| label as f64).collect()
    }
}

/// Cluster the rows of `dataset` into `k` groups with the default seed.
pub fn cluster(dataset: &Dataset, k: usize) -> Result<ClusterAssignment> {
    KMeans::new(k).fit(dataset)
}

/// Cluster the rows of `dataset` into `k` groups with an explicit seed.
pub fn cluster_with_seed(dataset: &Dataset, k: usize, seed: u64) -> Result<ClusterAssignment> {
    KMeans::new(k).with_seed(seed).fit(dataset)
}

/// Lloyd's algorithm with k-means++ initialisation.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
    max_iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn fit(&self, dataset: &Dataset) -> Result<ClusterAssignment> {
        if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&self.k) {
            return Err(ConfigValidationError::InvalidClusterCount(self.k).into());
        }
        dataset.ensure_not_empty()?;
        if dataset.height() < self.k {
            return Err(PipelineError::insufficient(
                "k-means rows",
                self.k,
                dataset.height(),
            ));
        }

        let points = finite_rows(dataset, "k-means")?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.initial_centroids(&points, &mut rng);
        let mut labels = vec![0; points.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;
            assign(&points, &centroids, &mut labels);
            let updated = self.update_centroids(&points, &labels, &centroids);
            let shift = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| squared_distance(old, new).sqrt())
                .fold(0.0, f64::max);
            centroids = updated;

            if shift <= TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "K-means stopped after {} iterations without converging",
                iterations
            );
        }

        assign(&points, &centroids, &mut labels);
        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(point, &label)| squared_distance(point, &centroids[label]))
            .sum();

        let (labels, centroids) = canonicalize(labels, centroids);
        debug!(
            "K-means k={} finished in {} iterations (inertia {:.4})",
            self.k, iterations, inertia
        );

        Ok(ClusterAssignment {
            labels,
            k: self.k,
            centroids,
            inertia,
            iterations,
            converged,
        })
    }

    /// k-means++: each new centroid is drawn with probability proportional to
    /// its squared distance from the nearest centroid chosen so far.
    fn initial_centroids(&self, points: &[Vec<f64>], rng: &mut StdRng) -> Vec<Vec<f64>> {
        let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
        let mut distances: Vec<f64> = points
            .iter()
            .map(|point| squared_distance(point, &centroids[0]))
            .collect();

        while centroids.len() < self.k {
            let total: f64 = distances.iter().sum();
            let chosen = if total > 0.0 {
                let target = rng.r#gen::<f64>() * total;
                let mut cumulative = 0.0;
                distances
                    .iter()
                    .position(|&d| {
                        cumulative += d;
                        d > 0.0 && cumulative >= target
                    })
                    .or_else(|| distances.iter().rposition(|&d| d > 0.0))
                    .unwrap_or(0)
            } else {
                rng.gen_range(0..points.len())
            };

            let centroid = points[chosen].clone();
            for (distance, point) in distances.iter_mut().zip(points) {
                *distance = distance.min(squared_distance(point, &centroid));
            }
            centroids.push(centroid);
        }

        centroids
    }

    /// Mean of each cluster's members. An empty cluster takes the point
    /// farthest from its current centroid.
    fn update_centroids(
        &self,
        points: &[Vec<f64>],
        labels: &[usize],
        previous: &[Vec<f64>],
    ) -> Vec<Vec<f64>> {
        let dims = points[0].len();
        let mut sums = vec![vec![0.0; dims]; self.k];
        let mut counts = vec![0usize; self.k];

        for (point, &label) in points.iter().zip(labels) {
            counts[label] += 1;
            for (sum, value) in sums[label].iter_mut().zip(point) {
                *sum += value;
            }
        }

        let mut taken = vec![false; points.len()];
        sums.into_iter()
            .zip(&counts)
            .enumerate()
            .map(|(cluster, (sum, &count))| {
                if count > 0 {
                    return sum.into_iter().map(|s| s / count as f64).collect();
                }
                let farthest = points
                    .iter()
                    .zip(labels)
                    .enumerate()
                    .filter(|(idx, _)| !taken[*idx])
                    .map(|(idx, (point, &label))| {
                        (idx, squared_distance(point, &previous[label]))
                    })
                    .fold(None, |best: Option<(usize, f64)>, (idx, d)| match best {
                        Some((_, best_d)) if best_d >= d => best,
                        _ => Some((idx, d)),
                    });
                match farthest {
                    Some((idx, _)) => {
                        debug!("Re-seeding empty cluster {} with row {}", cluster, idx);
                        taken[idx] = true;
                        points[idx].clone()
                    }
                    None => previous[cluster].clone(),
                }
            })
            .collect()
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Label of the nearest centroid for every point; ties go to the lower label.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) {
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (idx, centroid) in centroids.iter().enumerate() {
            let distance = squared_distance(point, centroid);
            if distance < best_distance {
                best = idx;
                best_distance = distance;
            }
        }
        *label = best;
    }
}

/// Renumber labels by first appearance. Centroids that own no row keep
/// their relative order after the used ones.
fn canonicalize(labels: Vec<usize>, centroids: Vec<Vec<f64>>) -> (Vec<usize>, Vec<Vec<f64>>) {
    let k = centroids.len();
    let mut order: Vec<usize> = Vec::with_capacity(k);
    for &label in &labels {
        if !order.contains(&label) {
            order.push(label);
        }
    }
    for label in 0..k {
        if !order.contains(&label) {
            order.push(label);
        }
    }

    let mut remap = vec![0; k];
    for (new, &old) in order.iter().enumerate() {
        remap[old] = new;
    }

    let labels = labels.into_iter().map(|label| remap[label]).collect();
    let centroids = order.iter().map(|&old| centroids[old].clone()).collect();
    (labels, centroids)
}
