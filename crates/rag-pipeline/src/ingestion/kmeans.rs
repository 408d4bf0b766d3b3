//! Deterministic k-means clustering for semantic chunking

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

const MAX_ITERATIONS: usize = 300;
const SEED: u64 = 0;

/// k-means with k-means++ seeding (fixed seed) and Lloyd iterations
pub struct KMeans {
    k: usize,
}

impl KMeans {
    /// Create a clusterer for `k` clusters
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Cluster the given vectors and return one label per vector, in `0..k`
    pub fn fit_predict(&self, vectors: &[Vec<f32>]) -> Result<Vec<usize>> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        if self.k == 0 {
            return Err(Error::invalid_config("k-means needs at least one cluster"));
        }

        let dim = vectors[0].len();
        if vectors.iter().any(|v| v.len() != dim) {
            return Err(Error::embedding("Sentence embeddings have mixed dimensions"));
        }

        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((vectors.len(), dim), flat)
            .map_err(|e| Error::internal(format!("Invalid embedding matrix: {}", e)))?;

        let k = self.k.min(vectors.len());
        let mut centroids = Self::init_centroids(data.view(), k);
        let mut labels = vec![usize::MAX; data.nrows()];

        for _ in 0..MAX_ITERATIONS {
            // Assign each point to its nearest centroid
            let mut changed = false;
            for (i, point) in data.outer_iter().enumerate() {
                let best = nearest(point, centroids.view());
                if labels[i] != best {
                    labels[i] = best;
                    changed = true;
                }
            }

            if !changed {
                break;
            }

            // Recompute centroids; an empty cluster keeps its previous centroid
            let mut sums = Array2::<f32>::zeros((k, dim));
            let mut counts = vec![0usize; k];
            for (i, point) in data.outer_iter().enumerate() {
                let mut row = sums.row_mut(labels[i]);
                row += &point;
                counts[labels[i]] += 1;
            }
            for (c, count) in counts.iter().enumerate() {
                if *count > 0 {
                    let mean = sums.row(c).mapv(|v| v / *count as f32);
                    centroids.row_mut(c).assign(&mean);
                }
            }
        }

        Ok(labels)
    }

    /// k-means++ seeding
    fn init_centroids(data: ArrayView2<f32>, k: usize) -> Array2<f32> {
        let n = data.nrows();
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut chosen = Vec::with_capacity(k);
        chosen.push(rng.gen_range(0..n));

        let mut min_dist: Vec<f32> = data
            .outer_iter()
            .map(|p| squared_distance(p, data.row(chosen[0])))
            .collect();

        while chosen.len() < k {
            let total: f32 = min_dist.iter().sum();
            let next = if total > 0.0 {
                let target = rng.gen::<f32>() * total;
                let mut acc = 0.0;
                let mut pick = n - 1;
                for (i, d) in min_dist.iter().enumerate() {
                    acc += d;
                    if acc >= target && *d > 0.0 {
                        pick = i;
                        break;
                    }
                }
                pick
            } else {
                // All remaining points coincide with a centroid
                (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
            };

            chosen.push(next);
            for (i, p) in data.outer_iter().enumerate() {
                let d = squared_distance(p, data.row(next));
                if d < min_dist[i] {
                    min_dist[i] = d;
                }
            }
        }

        let mut centroids = Array2::<f32>::zeros((k, data.ncols()));
        for (c, &idx) in chosen.iter().enumerate() {
            centroids.row_mut(c).assign(&data.row(idx));
        }
        centroids
    }
}

fn nearest(point: ArrayView1<f32>, centroids: ArrayView2<f32>) -> usize {
    centroids
        .outer_iter()
        .enumerate()
        .map(|(c, centroid)| (c, squared_distance(point, centroid)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
        .unwrap_or(0)
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![0.1, 0.2],
            vec![10.2, 9.9],
            vec![0.2, 0.1],
            vec![9.8, 10.1],
        ]
    }

    #[test]
    fn test_separates_blobs() {
        let labels = KMeans::new(2).fit_predict(&two_blobs()).unwrap();

        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[0], labels[4]);
        assert_eq!(labels[1], labels[3]);
        assert_eq!(labels[1], labels[5]);
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = KMeans::new(3).fit_predict(&two_blobs()).unwrap();
        let b = KMeans::new(3).fit_predict(&two_blobs()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_capped_by_points() {
        let points = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let labels = KMeans::new(10).fit_predict(&points).unwrap();
        assert!(labels.iter().all(|&l| l < 2));
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_identical_points() {
        let points = vec![vec![1.0, 1.0]; 4];
        let labels = KMeans::new(3).fit_predict(&points).unwrap();
        assert_eq!(labels.len(), 4);
        assert!(labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn test_nan_and_duplicate_points_stay_in_range() {
        let mut points = two_blobs();
        points.push(vec![f32::NAN, 0.0]);
        points.push(vec![0.0, 0.0]);

        let a = KMeans::new(4).fit_predict(&points).unwrap();
        let b = KMeans::new(4).fit_predict(&points).unwrap();
        assert_eq!(a.len(), points.len());
        assert!(a.iter().all(|&l| l < 4));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_mixed_input() {
        assert!(KMeans::new(2).fit_predict(&[]).unwrap().is_empty());
        assert!(KMeans::new(2)
            .fit_predict(&[vec![1.0], vec![1.0, 2.0]])
            .is_err());
    }
}
