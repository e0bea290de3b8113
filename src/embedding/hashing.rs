//! Local feature-hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed (FNV-1a, 64-bit) into one of
//! `dimensions` buckets with a hash-derived sign, and the resulting vector is
//! scaled to unit length. Output depends only on the input text and the
//! dimension, so builds and queries are reproducible without a model server.

use super::Embedder;
use crate::error::{Result, SpotterError};
use async_trait::async_trait;
use fnv::FnvHasher;
use regex::Regex;
use std::hash::Hasher;

/// Deterministic bag-of-words embedder.
pub struct HashingEmbedder {
    dimensions: usize,
    token_re: Regex,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(SpotterError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        let token_re = Regex::new(r"[a-z0-9]+")
            .map_err(|e| SpotterError::Embedding(format!("Invalid token pattern: {}", e)))?;

        Ok(Self {
            dimensions,
            token_re,
        })
    }

    /// Embed synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in self.token_re.find_iter(&lowered) {
            let hash = fnv1a(token.as_str().as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn identity(&self) -> String {
        "hashing/fnv1a-64".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::l2_distance;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_embedding_is_unit_length_and_deterministic() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let a = embedder.embed_text("Barbell Bench Press");
        let b = embedder.embed_text("barbell bench press");
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_gives_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed_text("!!! ---").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_tokens_are_closer() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let query = embedder.embed_text("push up form");
        let push_up = embedder.embed_text("{'name': 'Push-up'}");
        let squat = embedder.embed_text("{'name': 'Squat'}");
        assert!(l2_distance(&query, &push_up) < l2_distance(&query, &squat));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let texts = vec!["oats".to_string(), "salmon fillet".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch[1], embedder.embed("salmon fillet").await.unwrap());
    }
}
