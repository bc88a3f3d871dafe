//! Fallback vectors for out-of-vocabulary words
//!
//! A fallback vector is a standard-normal sample rescaled so its norm equals
//! the mean norm of the store it stands in for. It carries no meaning; it only
//! keeps downstream similarity code away from zero vectors.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::models::{EmbeddingStore, Vector};

/// Generates norm-matched random vectors. Every call draws fresh samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackVectorGenerator;

impl FallbackVectorGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Random vector of `dimension` components with Euclidean norm `mean_norm`
    pub fn generate(&self, dimension: usize, mean_norm: f64) -> Vector {
        self.generate_with(&mut rand::thread_rng(), dimension, mean_norm)
    }

    /// Random vector scaled to the statistics of `store`
    pub fn generate_for(&self, store: &EmbeddingStore) -> Vector {
        self.generate(store.dimension(), store.mean_norm())
    }

    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        dimension: usize,
        mean_norm: f64,
    ) -> Vector {
        if dimension == 0 {
            return Vec::new();
        }

        loop {
            let sample: Vec<f64> = (0..dimension)
                .map(|_| Distribution::<f64>::sample(&StandardNormal, &mut *rng))
                .collect();
            let norm = sample.iter().map(|x| x * x).sum::<f64>().sqrt();
            // An all-zero draw cannot be rescaled
            if norm == 0.0 || !norm.is_finite() {
                continue;
            }

            let scale = mean_norm / norm;
            return sample.into_iter().map(|x| (x * scale) as f32).collect();
        }
    }
}
