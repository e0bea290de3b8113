//! Pipeline orchestrator for Spotter.
//!
//! Coordinates the offline build (sources to corpus to embeddings to a
//! persisted generation) and loading the current generation for serving.

use crate::config::{Prompts, Settings};
use crate::corpus::{BuildSummary, CorpusBuilder, SourceSpec};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Result, SpotterError};
use crate::rag::{Generator, RagEngine};
use crate::retrieval::{Retriever, Snapshot};
use crate::vector_store::{GenerationStore, Manifest};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The main orchestrator for the Spotter pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    store: GenerationStore,
}

impl Orchestrator {
    /// Create an orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let embedder = create_embedder(&settings.embedding)?;
        Ok(Self::with_components(settings, prompts, embedder))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let store = GenerationStore::new(settings.index_dir());
        Self {
            settings,
            prompts,
            embedder,
            store,
        }
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// Build a corpus from `sources` (the configured ones when empty), embed
    /// it and publish it as a new generation.
    ///
    /// Nothing is published if any step fails.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn build(&self, sources: &[SourceSpec]) -> Result<BuildResult> {
        let sources = if sources.is_empty() {
            self.settings.corpus.sources.as_slice()
        } else {
            sources
        };

        let corpus_dir = self.settings.corpus_dir();
        info!("Building corpus from {} sources in {:?}", sources.len(), corpus_dir);

        let mut builder = CorpusBuilder::new().with_base_dir(corpus_dir);
        builder.add_sources(sources);
        let (corpus, summary) = builder.finish();
        if corpus.is_empty() {
            warn!("Corpus is empty; the published index will return no results");
        }

        info!(
            "Embedding {} records with {}",
            corpus.len(),
            self.embedder.identity()
        );
        let snapshot = Snapshot::build(corpus, self.embedder.as_ref()).await?;
        let manifest = self
            .store
            .save(&snapshot, &self.embedder.identity(), sources, &summary)?;

        Ok(BuildResult { manifest, summary })
    }

    /// Load the current generation, checking it against the configured embedder.
    #[instrument(skip(self))]
    pub fn load_current(&self) -> Result<Option<(Manifest, Snapshot)>> {
        let Some((manifest, snapshot)) = self.store.load_current()? else {
            return Ok(None);
        };

        let identity = self.embedder.identity();
        if manifest.embedder != identity {
            warn!(
                "Generation {} was built with {} but queries will use {}",
                manifest.generation_id, manifest.embedder, identity
            );
        }

        let index = snapshot.index();
        if !index.is_empty() && index.dimension() != self.embedder.dimensions() {
            return Err(SpotterError::DimensionMismatch {
                expected: index.dimension(),
                actual: self.embedder.dimensions(),
            });
        }

        Ok(Some((manifest, snapshot)))
    }

    /// A retriever serving the current generation, or unbuilt if there is none.
    pub fn retriever(&self) -> Result<Arc<Retriever>> {
        let retriever = Retriever::new(self.embedder.clone())
            .with_query_timeout(self.settings.retrieval.query_timeout());

        match self.load_current()? {
            Some((_, snapshot)) => Ok(Arc::new(retriever.with_snapshot(snapshot))),
            None => {
                warn!("No index generation found; run 'spotter build' first");
                Ok(Arc::new(retriever))
            }
        }
    }

    /// Re-read `CURRENT` and publish it into a running retriever.
    pub fn reload(&self, retriever: &Retriever) -> Result<Option<Manifest>> {
        match self.load_current()? {
            Some((manifest, snapshot)) => {
                retriever.publish(snapshot);
                Ok(Some(manifest))
            }
            None => Ok(None),
        }
    }

    /// A RAG engine over `retriever` using the configured prompts and `top_k`.
    pub fn rag_engine(&self, retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> RagEngine {
        RagEngine::new(retriever, generator)
            .with_prompts(self.prompts.clone())
            .with_top_k(self.settings.retrieval.top_k)
    }
}

/// Result of a build.
#[derive(Debug)]
pub struct BuildResult {
    /// Manifest of the published generation.
    pub manifest: Manifest,
    pub summary: BuildSummary,
}
