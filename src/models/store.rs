//! In-memory embedding store
//!
//! One `EmbeddingStore` holds every vector of a single language model along
//! with the statistics computed when it was loaded. Stores are immutable:
//! a reload builds a new store and the registry swaps the reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Vector, VectorError, VectorResult};

/// Summary of a loaded store, reported by the info and health endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Language code the store serves
    pub language: String,
    /// Path the vectors were loaded from
    pub source: String,
    /// Number of words in the vocabulary
    pub words: usize,
    /// Length of every vector
    pub dimension: usize,
    /// Mean Euclidean norm over all vectors
    pub mean_norm: f64,
}

/// Word to vector mapping for one loaded language model
#[derive(Debug)]
pub struct EmbeddingStore {
    language: String,
    source: String,
    vectors: HashMap<String, Vector>,
    dimension: usize,
    mean_norm: f64,
}

impl EmbeddingStore {
    /// Build a store from a finished loader mapping.
    ///
    /// Fails when the mapping is empty, when vectors disagree in length or
    /// when a component is NaN or infinite.
    pub fn new(
        language: impl Into<String>,
        source: impl Into<String>,
        vectors: HashMap<String, Vector>,
    ) -> VectorResult<Self> {
        let source = source.into();

        let dimension = match vectors.values().next() {
            Some(vector) => vector.len(),
            None => return Err(VectorError::load_error(source, "no vectors found")),
        };
        if dimension == 0 {
            return Err(VectorError::load_error(source, "vectors have zero length"));
        }

        let mut norm_sum = 0.0f64;
        for (word, vector) in &vectors {
            if vector.len() != dimension {
                return Err(VectorError::load_error(
                    source,
                    format!(
                        "vector for '{}' has {} components, expected {}",
                        word,
                        vector.len(),
                        dimension
                    ),
                ));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(VectorError::load_error(
                    source,
                    format!("vector for '{}' has a non-finite component", word),
                ));
            }
            norm_sum += l2_norm(vector);
        }
        let mean_norm = norm_sum / vectors.len() as f64;

        Ok(Self {
            language: language.into(),
            source,
            vectors,
            dimension,
            mean_norm,
        })
    }

    /// Exact-string lookup; no case folding or normalization
    pub fn lookup(&self, word: &str) -> Option<&Vector> {
        self.vectors.get(word)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.vectors.contains_key(word)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn mean_norm(&self) -> f64 {
        self.mean_norm
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn info(&self) -> StoreInfo {
        StoreInfo {
            language: self.language.clone(),
            source: self.source.clone(),
            words: self.vectors.len(),
            dimension: self.dimension,
            mean_norm: self.mean_norm,
        }
    }
}

/// Euclidean norm, accumulated in f64
pub fn l2_norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&x| {
            let x = x as f64;
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vectors() -> HashMap<String, Vector> {
        let mut vectors = HashMap::new();
        vectors.insert("cat".to_string(), vec![3.0, 4.0, 0.0]);
        vectors.insert("dog".to_string(), vec![0.0, 0.0, 1.0]);
        vectors.insert("Word".to_string(), vec![1.0, 0.0, 0.0]);
        vectors
    }

    #[test]
    fn test_store_statistics() {
        let store = EmbeddingStore::new("en", "test.txt", sample_vectors()).unwrap();
        assert_eq!(store.dimension(), 3);
        assert_eq!(store.len(), 3);
        // norms are 5, 1 and 1
        assert!((store.mean_norm() - 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_lookup_returns_full_vectors() {
        let store = EmbeddingStore::new("en", "test.txt", sample_vectors()).unwrap();
        for word in ["cat", "dog", "Word"] {
            assert_eq!(store.lookup(word).unwrap().len(), store.dimension());
        }
        assert_eq!(store.lookup("cat"), Some(&vec![3.0, 4.0, 0.0]));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let store = EmbeddingStore::new("en", "test.txt", sample_vectors()).unwrap();
        assert!(store.contains("Word"));
        assert!(!store.contains("word"));
        assert!(store.lookup("word").is_none());
        assert!(store.lookup(" cat").is_none());
    }

    #[test]
    fn test_empty_mapping_is_a_load_error() {
        let result = EmbeddingStore::new("en", "empty.txt", HashMap::new());
        assert!(matches!(result, Err(VectorError::LoadError { .. })));
    }

    #[test]
    fn test_mismatched_dimensions_are_rejected() {
        let mut vectors = sample_vectors();
        vectors.insert("short".to_string(), vec![1.0]);
        let result = EmbeddingStore::new("en", "bad.txt", vectors);
        assert!(matches!(result, Err(VectorError::LoadError { .. })));
    }

    #[test]
    fn test_zero_length_vectors_are_rejected() {
        let mut vectors = HashMap::new();
        vectors.insert("nothing".to_string(), Vec::new());
        assert!(EmbeddingStore::new("en", "bad.txt", vectors).is_err());
    }

    #[test]
    fn test_non_finite_components_are_rejected() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut vectors = sample_vectors();
            vectors.insert("broken".to_string(), vec![1.0, bad, 0.0]);
            let result = EmbeddingStore::new("en", "bad.txt", vectors);
            assert!(matches!(result, Err(VectorError::LoadError { .. })));
        }
    }

    #[test]
    fn test_store_info() {
        let store = EmbeddingStore::new("de", "/data/de.vec", sample_vectors()).unwrap();
        let info = store.info();
        assert_eq!(info.language, "de");
        assert_eq!(info.source, "/data/de.vec");
        assert_eq!(info.words, 3);
        assert_eq!(info.dimension, 3);
    }
}
