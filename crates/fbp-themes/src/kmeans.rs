//! Seeded k-means with k-means++ initialization.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ThemeError;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster index per input point.
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub iterations: usize,
}

impl Clustering {
    #[must_use]
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest centroid; ties go to the lower index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 {
                candidate
            } else {
                best
            }
        })
}

/// Choose `k` initial centroids, each new one sampled with probability
/// proportional to its squared distance from the nearest chosen centroid.
fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut chosen: Vec<usize> = vec![rng.random_range(0..points.len())];

    while chosen.len() < k {
        let centroids: Vec<Vec<f64>> = chosen.iter().map(|&i| points[i].clone()).collect();
        let weights: Vec<f64> = points
            .iter()
            .map(|p| nearest(p, &centroids).1)
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            weights
                .iter()
                .position(|w| {
                    cumulative += w;
                    cumulative > target
                })
                .unwrap_or(points.len() - 1)
        } else {
            // Every remaining point coincides with a centroid.
            match (0..points.len()).find(|i| !chosen.contains(i)) {
                Some(i) => i,
                None => break,
            }
        };
        chosen.push(next);
    }

    chosen.into_iter().map(|i| points[i].clone()).collect()
}

/// Cluster `points` into at most `params.k` groups.
///
/// Iterates until no assignment changes, every centroid moves less than
/// `tolerance`, or `max_iterations` is reached. A cluster that loses all
/// its members keeps its previous centroid.
///
/// # Errors
///
/// Returns [`ThemeError::InvalidParameter`] for `k == 0` or empty input and
/// [`ThemeError::NonFinite`] if any centroid becomes NaN or infinite.
pub fn kmeans(points: &[Vec<f64>], params: &KMeansParams) -> Result<Clustering, ThemeError> {
    if points.is_empty() || params.k == 0 {
        return Err(ThemeError::InvalidParameter(format!(
            "k-means needs points and k >= 1 (points: {}, k: {})",
            points.len(),
            params.k
        )));
    }
    let k = params.k.min(points.len());
    let dims = points[0].len();

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = plus_plus_init(points, k, &mut rng);
    let mut assignments: Vec<usize> = points.iter().map(|p| nearest(p, &centroids).0).collect();
    let mut iterations = 0;

    while iterations < params.max_iterations {
        iterations += 1;

        let mut sums = vec![vec![0.0; dims]; centroids.len()];
        let mut counts = vec![0_usize; centroids.len()];
        for (point, &cluster) in points.iter().zip(&assignments) {
            counts[cluster] += 1;
            for (s, x) in sums[cluster].iter_mut().zip(point) {
                *s += x;
            }
        }

        let mut max_shift = 0.0_f64;
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(&counts) {
            if *count == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let updated: Vec<f64> = sum.into_iter().map(|s| s / *count as f64).collect();
            max_shift = max_shift.max(squared_distance(centroid, &updated).sqrt());
            *centroid = updated;
        }

        if centroids.iter().flatten().any(|x| !x.is_finite()) {
            return Err(ThemeError::NonFinite(format!(
                "centroid update at iteration {iterations}"
            )));
        }

        let reassigned: Vec<usize> = points.iter().map(|p| nearest(p, &centroids).0).collect();
        let changed = reassigned != assignments;
        assignments = reassigned;

        if !changed || max_shift < params.tolerance {
            break;
        }
    }

    tracing::debug!(k, iterations, "k-means finished");

    Ok(Clustering {
        assignments,
        centroids,
        iterations,
    })
}
