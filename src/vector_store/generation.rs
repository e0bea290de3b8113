//! Generation directories and the `CURRENT` pointer.

use super::SqliteRecordStore;
use crate::corpus::{BuildSummary, SourceSpec};
use crate::error::{Result, SpotterError};
use crate::index::artifact::{self, IndexHeader};
use crate::retrieval::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const CURRENT_FILE: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";
const INDEX_FILE: &str = "vectors.index";
const MATRIX_FILE: &str = "embeddings.npy";
const RECORDS_FILE: &str = "records.db";
const MANIFEST_FILE: &str = "manifest.json";

/// Description of a persisted generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generation_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Identity of the embedder that produced the vectors.
    pub embedder: String,
    pub dimension: usize,
    pub ntotal: usize,
    pub sources: Vec<SourceSpec>,
    pub summary: BuildSummary,
}

/// What `inspect` reports about a generation.
#[derive(Debug, Clone)]
pub struct GenerationInfo {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub header: IndexHeader,
    /// `(rows, cols)` of the embedding matrix.
    pub matrix_shape: (usize, usize),
    pub record_count: usize,
    pub source_counts: Vec<(String, usize)>,
}

/// Reads and writes generations under one index directory.
#[derive(Debug, Clone)]
pub struct GenerationStore {
    root: PathBuf,
}

impl GenerationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a single generation.
    pub fn generation_dir(&self, id: &Uuid) -> PathBuf {
        self.root.join(GENERATIONS_DIR).join(id.to_string())
    }

    /// Write a snapshot as a new generation and make it current.
    #[instrument(skip_all, fields(records = snapshot.len()))]
    pub fn save(
        &self,
        snapshot: &Snapshot,
        embedder: &str,
        sources: &[SourceSpec],
        summary: &BuildSummary,
    ) -> Result<Manifest> {
        let manifest = Manifest {
            generation_id: Uuid::new_v4(),
            created_at: Utc::now(),
            embedder: embedder.to_string(),
            dimension: snapshot.index().dimension(),
            ntotal: snapshot.index().ntotal(),
            sources: sources.to_vec(),
            summary: summary.clone(),
        };

        let dir = self.generation_dir(&manifest.generation_id);
        std::fs::create_dir_all(&dir)?;

        artifact::save_index(snapshot.index(), &dir.join(INDEX_FILE))?;
        artifact::save_npy(snapshot.index(), &dir.join(MATRIX_FILE))?;
        SqliteRecordStore::open(&dir.join(RECORDS_FILE))?.write_corpus(snapshot.corpus())?;
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        debug!("Wrote generation files to {:?}", dir);

        self.set_current(&manifest.generation_id)?;
        info!(
            "Published generation {} ({} records)",
            manifest.generation_id, manifest.ntotal
        );
        Ok(manifest)
    }

    /// Point `CURRENT` at a generation, replacing the file atomically.
    pub fn set_current(&self, id: &Uuid) -> Result<()> {
        if !self.generation_dir(id).join(MANIFEST_FILE).exists() {
            return Err(SpotterError::Storage(format!("No generation {}", id)));
        }

        std::fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        writeln!(tmp, "{}", id)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.root.join(CURRENT_FILE))
            .map_err(|e| SpotterError::Storage(format!("Failed to update CURRENT: {}", e)))?;
        Ok(())
    }

    /// The generation `CURRENT` points at, if any.
    pub fn current_id(&self) -> Result<Option<Uuid>> {
        let path = self.root.join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let id = Uuid::parse_str(content.trim()).map_err(|e| {
            SpotterError::Storage(format!("CURRENT does not hold a generation id: {}", e))
        })?;
        Ok(Some(id))
    }

    /// Manifests of every generation on disk, oldest first.
    pub fn list(&self) -> Result<Vec<Manifest>> {
        let dir = self.root.join(GENERATIONS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path().join(MANIFEST_FILE);
            match read_manifest(&path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => debug!("Ignoring {:?}: {}", path, e),
            }
        }
        manifests.sort_by_key(|m| m.created_at);
        Ok(manifests)
    }

    /// Load a generation into a snapshot.
    #[instrument(skip(self))]
    pub fn load(&self, id: &Uuid) -> Result<(Manifest, Snapshot)> {
        let dir = self.generation_dir(id);
        let manifest = read_manifest(&dir.join(MANIFEST_FILE))?;
        let index = artifact::load_index(&dir.join(INDEX_FILE))?;
        let corpus = SqliteRecordStore::open(&dir.join(RECORDS_FILE))?.read_corpus()?;

        if manifest.ntotal != index.ntotal() {
            warn!(
                "Manifest lists {} vectors but index holds {}",
                manifest.ntotal,
                index.ntotal()
            );
        }

        info!("Loaded generation {} ({} records)", id, corpus.len());
        Ok((manifest, Snapshot::new(corpus, index)))
    }

    /// Load whatever `CURRENT` points at.
    pub fn load_current(&self) -> Result<Option<(Manifest, Snapshot)>> {
        match self.current_id()? {
            Some(id) => self.load(&id).map(Some),
            None => Ok(None),
        }
    }

    /// Summarise the current generation without building a snapshot.
    pub fn inspect_current(&self) -> Result<Option<GenerationInfo>> {
        let Some(id) = self.current_id()? else {
            return Ok(None);
        };

        let dir = self.generation_dir(&id);
        let manifest = read_manifest(&dir.join(MANIFEST_FILE))?;
        let header = artifact::load_header(&dir.join(INDEX_FILE))?;
        let (rows, cols, _) = artifact::load_npy(&dir.join(MATRIX_FILE))?;
        let records = SqliteRecordStore::open(&dir.join(RECORDS_FILE))?;

        Ok(Some(GenerationInfo {
            path: dir,
            manifest,
            header,
            matrix_shape: (rows, cols),
            record_count: records.record_count()?,
            source_counts: records.source_counts()?,
        }))
    }
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
