//! Corpus building: flattening exercise, food and meal documents into numbered records.
//!
//! A [`Corpus`] is the ordered, immutable list of [`Record`]s produced by a single
//! build. Record `i` always sits at position `i` and is paired with row `i` of the
//! embedding matrix, so the corpus is only created by [`CorpusBuilder`] or reloaded
//! from a persisted generation, and never modified afterwards.

mod builder;
pub mod render;
mod source;

pub use builder::{BuildSummary, CorpusBuilder};
pub use source::{Entry, SourceSpec, KNOWN_FIELDS};

use crate::error::{Result, SpotterError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One retrievable unit: an exercise, a stretch, a food fact or a meal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position of this record in the corpus (zero-based).
    pub seq_num: usize,
    /// Source file the record came from.
    pub source: String,
    /// Key name when the record was taken from a mapping rather than a list.
    pub label: Option<String>,
    /// Rendered text of the original entry. Embedded and handed to the generator.
    pub text: String,
}

/// The ordered record list for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    records: Vec<Record>,
}

impl Corpus {
    /// An empty corpus.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuild a corpus from persisted records.
    ///
    /// Records must already be sorted and numbered `0..n` with no gaps.
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        if let Some((pos, record)) = records
            .iter()
            .enumerate()
            .find(|(pos, record)| record.seq_num != *pos)
        {
            return Err(SpotterError::IndexFormat(format!(
                "record at position {} has sequence number {}",
                pos, record.seq_num
            )));
        }
        Ok(Self { records })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at a position.
    pub fn get(&self, seq_num: usize) -> Option<&Record> {
        self.records.get(seq_num)
    }

    /// All records in corpus order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Record texts in corpus order, ready for embedding.
    pub fn texts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.text.clone()).collect()
    }

    /// Map identifiers returned by an index back to records.
    ///
    /// Identifiers past the end of the corpus are dropped; they can only come
    /// from an index built over a different corpus.
    pub fn resolve(&self, ids: &[usize]) -> Vec<&Record> {
        ids.iter().filter_map(|&id| self.lookup(id)).collect()
    }

    /// Single-identifier form of [`Corpus::resolve`].
    pub fn lookup(&self, id: usize) -> Option<&Record> {
        let record = self.records.get(id);
        if record.is_none() {
            debug!(id, len = self.records.len(), "Dropping stale index identifier");
        }
        record
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
