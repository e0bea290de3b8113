//! Exact nearest-neighbour index over record embeddings.
//!
//! [`FlatL2Index`] stores every vector in one row-major buffer and answers
//! queries by brute-force Euclidean distance. Identifiers are row positions,
//! `0..ntotal`, in the order the vectors were given to [`FlatL2Index::build`].

pub mod artifact;

use crate::error::{Result, SpotterError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A search hit: row identifier and L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Flat (exhaustive) L2 index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    ntotal: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Build an index over the given vectors.
    ///
    /// All vectors must share one dimension. An empty input gives an empty
    /// index that answers every query with no results.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(dimension * vectors.len());

        for vector in vectors {
            if vector.len() != dimension {
                return Err(SpotterError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            ntotal: vectors.len(),
            data,
        })
    }

    /// Rebuild an index from a row-major buffer of `ntotal` rows.
    pub fn from_parts(dimension: usize, ntotal: usize, data: Vec<f32>) -> Result<Self> {
        let expected = dimension
            .checked_mul(ntotal)
            .ok_or_else(|| SpotterError::IndexFormat("index shape overflows".to_string()))?;
        if data.len() != expected {
            return Err(SpotterError::IndexFormat(format!(
                "expected {} values for {} x {} index, found {}",
                expected,
                ntotal,
                dimension,
                data.len()
            )));
        }
        Ok(Self {
            dimension,
            ntotal,
            data,
        })
    }

    /// Vector dimension (0 for an empty index).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors.
    pub fn ntotal(&self) -> usize {
        self.ntotal
    }

    pub fn is_empty(&self) -> bool {
        self.ntotal == 0
    }

    /// Row-major vector data.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The vector stored at a row.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        if id >= self.ntotal {
            return None;
        }
        let start = id * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Find the `k` rows closest to `query`.
    ///
    /// Results are sorted by ascending distance, ties by ascending id. Asking
    /// for more rows than the index holds returns all of them.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(SpotterError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = (0..self.ntotal)
            .map(|id| {
                let start = id * self.dimension;
                let row = &self.data[start..start + self.dimension];
                (squared_l2(query, row), id)
            })
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, compare_hits);
            scored.truncate(k);
        }
        scored.sort_by(compare_hits);

        Ok(scored
            .into_iter()
            .map(|(sq, id)| Neighbor {
                id,
                distance: sq.sqrt(),
            })
            .collect())
    }
}

fn compare_hits(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance between two vectors of equal length.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_l2(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatL2Index {
        FlatL2Index::build(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 2.0],
            vec![3.0, 4.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_l2_distance() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let err = FlatL2Index::build(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            SpotterError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample();
        let hits = index.search(&[0.9, 0.1], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_search_breaks_ties_by_id() {
        let index = FlatL2Index::build(&[
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
        ])
        .unwrap();
        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let hits = sample().search(&[0.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        let mut ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_search_reports_true_distance() {
        let hits = sample().search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(hits[3].id, 3);
        assert!((hits[3].distance - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_index() {
        let index = FlatL2Index::build(&[]).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 2.0, 3.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        assert!(matches!(
            sample().search(&[1.0, 2.0, 3.0], 1),
            Err(SpotterError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_vector_lookup() {
        let index = sample();
        assert_eq!(index.vector(2), Some(&[0.0, 2.0][..]));
        assert_eq!(index.vector(4), None);
    }

    #[test]
    fn test_from_parts_checks_length() {
        assert!(FlatL2Index::from_parts(3, 2, vec![0.0; 6]).is_ok());
        assert!(FlatL2Index::from_parts(3, 2, vec![0.0; 5]).is_err());
    }
}
