//! Corpus builder.

use super::render::to_text;
use super::source::{extract_entries, Entry, SourceSpec};
use super::{Corpus, Record};
use crate::config::Settings;
use crate::error::{Result, SpotterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a corpus build, kept alongside the persisted generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Sources that produced records (possibly zero of them).
    pub files_read: usize,
    /// Sources skipped because they could not be read or parsed.
    pub files_skipped: usize,
    /// Total records in the corpus.
    pub records: usize,
    /// Skipped sources and other non-fatal problems, in encounter order.
    pub warnings: Vec<String>,
}

/// Flattens source documents into a numbered [`Corpus`].
///
/// Sequence numbers come from the builder's own record count, so they are
/// dense and equal to each record's position no matter how many sources are
/// added or skipped.
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    base_dir: Option<PathBuf>,
    records: Vec<Record>,
    summary: BuildSummary,
}

impl CorpusBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative source paths against this directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read one source file and append its entries.
    ///
    /// A source that cannot be read or parsed is skipped and recorded in the
    /// summary. Returns the number of records appended.
    pub fn add_source(&mut self, spec: &SourceSpec) -> usize {
        let path = self.resolve_path(&spec.path);
        match self.try_add_source(spec, &path) {
            Ok(count) => {
                info!("Read {} records from {}", count, spec.path);
                count
            }
            Err(e) => {
                warn!("Skipping source: {}", e);
                self.summary.files_skipped += 1;
                self.summary.warnings.push(e.to_string());
                0
            }
        }
    }

    /// Append every source in order.
    pub fn add_sources<'a>(&mut self, specs: impl IntoIterator<Item = &'a SourceSpec>) -> usize {
        specs.into_iter().map(|spec| self.add_source(spec)).sum()
    }

    /// Append the entries of an already-parsed document.
    pub fn add_document(
        &mut self,
        source: &str,
        document: Value,
        field: Option<&str>,
    ) -> Result<usize> {
        let extracted = extract_entries(document, field).map_err(|reason| SpotterError::SourceParse {
            path: source.to_string(),
            reason,
        })?;

        for note in extracted.warnings {
            warn!("{}: {}", source, note);
            self.summary.warnings.push(format!("{}: {}", source, note));
        }

        let count = extracted.entries.len();
        for entry in extracted.entries {
            self.push_entry(source, entry);
        }
        self.summary.files_read += 1;
        Ok(count)
    }

    /// Finish the build.
    pub fn finish(self) -> (Corpus, BuildSummary) {
        let mut summary = self.summary;
        summary.records = self.records.len();
        info!(
            "Corpus built: {} records from {} sources ({} skipped)",
            summary.records, summary.files_read, summary.files_skipped
        );
        (Corpus { records: self.records }, summary)
    }

    fn try_add_source(&mut self, spec: &SourceSpec, path: &Path) -> Result<usize> {
        let parse_error = |reason: String| SpotterError::SourceParse {
            path: spec.path.clone(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;

        self.add_document(&spec.path, document, spec.field.as_deref())
    }

    fn push_entry(&mut self, source: &str, entry: Entry) {
        let seq_num = self.records.len();
        let text = to_text(&entry.value);
        debug!(seq_num, source, "Adding record");
        self.records.push(Record {
            seq_num,
            source: source.to_string(),
            label: entry.label,
            text,
        });
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let expanded = Settings::expand_path(path);
        match &self.base_dir {
            Some(base) if expanded.is_relative() => base.join(expanded),
            _ => expanded,
        }
    }
}
