//! Online query path: question in, ranked records out.
//!
//! A [`Snapshot`] pairs a corpus with the index built from its embeddings.
//! The [`Retriever`] serves queries from whichever snapshot is currently
//! published. Publishing swaps a single `Arc`, so a query always resolves its
//! identifiers against the same snapshot it searched.

use crate::corpus::{Corpus, Record};
use crate::embedding::Embedder;
use crate::error::{Result, SpotterError};
use crate::index::{FlatL2Index, Neighbor};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default bound on the query embedding call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// An immutable corpus and the index over its embeddings.
#[derive(Debug)]
pub struct Snapshot {
    corpus: Corpus,
    index: FlatL2Index,
}

impl Snapshot {
    /// Pair a corpus with its index.
    ///
    /// Row `i` of the index must be the embedding of record `i`. A size
    /// difference is logged; identifiers without a record are dropped at
    /// resolve time.
    pub fn new(corpus: Corpus, index: FlatL2Index) -> Self {
        if corpus.len() != index.ntotal() {
            warn!(
                "Index holds {} vectors but corpus has {} records",
                index.ntotal(),
                corpus.len()
            );
        }
        Self { corpus, index }
    }

    /// A snapshot with no records.
    pub fn empty() -> Self {
        Self {
            corpus: Corpus::empty(),
            index: FlatL2Index::default(),
        }
    }

    /// Embed every record of `corpus` and index the vectors.
    #[instrument(skip_all, fields(records = corpus.len()))]
    pub async fn build(corpus: Corpus, embedder: &dyn Embedder) -> Result<Self> {
        let embeddings = embedder.embed_batch(&corpus.texts()).await?;
        if embeddings.len() != corpus.len() {
            return Err(SpotterError::Embedding(format!(
                "Embedder returned {} vectors for {} records",
                embeddings.len(),
                corpus.len()
            )));
        }

        let index = FlatL2Index::build(&embeddings)?;
        if !index.is_empty() && index.dimension() != embedder.dimensions() {
            return Err(SpotterError::DimensionMismatch {
                expected: embedder.dimensions(),
                actual: index.dimension(),
            });
        }

        info!(
            "Indexed {} vectors of dimension {}",
            index.ntotal(),
            index.dimension()
        );
        Ok(Self { corpus, index })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty() || self.index.is_empty()
    }

    /// Nearest rows for an already-embedded query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.index.search(query, k)
    }

    /// Records for the given identifiers, skipping any past the corpus end.
    pub fn resolve(&self, ids: &[usize]) -> Vec<&Record> {
        self.corpus.resolve(ids)
    }
}

/// A record returned for a question, with its distance to the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRecord {
    #[serde(flatten)]
    pub record: Record,
    pub distance: f32,
}

/// Search hits tied to the snapshot that produced them.
#[derive(Debug, Clone)]
pub struct Hits {
    snapshot: Arc<Snapshot>,
    neighbors: Vec<Neighbor>,
}

impl Hits {
    fn empty(snapshot: Arc<Snapshot>) -> Self {
        Self {
            snapshot,
            neighbors: Vec::new(),
        }
    }

    /// Identifiers and distances, closest first.
    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn ids(&self) -> Vec<usize> {
        self.neighbors.iter().map(|n| n.id).collect()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Resolve the hits against their own snapshot.
    pub fn records(&self) -> Vec<RetrievedRecord> {
        self.neighbors
            .iter()
            .filter_map(|n| {
                self.snapshot.corpus().lookup(n.id).map(|record| RetrievedRecord {
                    record: record.clone(),
                    distance: n.distance,
                })
            })
            .collect()
    }
}

/// Serves nearest-neighbour queries over the published snapshot.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    current: RwLock<Option<Arc<Snapshot>>>,
    query_timeout: Duration,
}

impl Retriever {
    /// Create a retriever with nothing published yet.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            current: RwLock::new(None),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set the bound on the query embedding call.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Publish an initial snapshot.
    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        self.publish(snapshot);
        self
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Replace the served snapshot. In-flight queries finish on the old one.
    pub fn publish(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let snapshot = Arc::new(snapshot);
        info!("Publishing snapshot with {} records", snapshot.len());
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        current.replace(snapshot)
    }

    /// The served snapshot.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(SpotterError::IndexNotBuilt)
    }

    /// Whether a snapshot has been published.
    pub fn is_built(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Find the `k` records closest to `question`.
    ///
    /// A failed or timed-out question embedding yields empty hits rather than
    /// an error, so callers can fall back to answering without context.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn query(&self, question: &str, k: usize) -> Result<Hits> {
        if k == 0 {
            return Err(SpotterError::InvalidInput(
                "Result count must be at least 1".to_string(),
            ));
        }

        let snapshot = self.snapshot()?;
        if snapshot.is_empty() {
            return Ok(Hits::empty(snapshot));
        }

        let embedding =
            match tokio::time::timeout(self.query_timeout, self.embedder.embed(question)).await {
                Ok(Ok(embedding)) => embedding,
                Ok(Err(e)) => {
                    warn!("Query embedding failed, returning no results: {}", e);
                    return Ok(Hits::empty(snapshot));
                }
                Err(_) => {
                    warn!(
                        "Query embedding timed out after {:?}, returning no results",
                        self.query_timeout
                    );
                    return Ok(Hits::empty(snapshot));
                }
            };

        let neighbors = snapshot.search(&embedding, k)?;
        debug!("Found {} neighbours", neighbors.len());

        Ok(Hits {
            snapshot,
            neighbors,
        })
    }

    /// Find and resolve the `k` records closest to `question`.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedRecord>> {
        Ok(self.query(question, k).await?.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusBuilder;
    use crate::embedding::HashingEmbedder;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SpotterError::Embedding("model offline".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn identity(&self) -> String {
            "test/failing".to_string()
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![0.0; 4])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn identity(&self) -> String {
            "test/slow".to_string()
        }
    }

    fn corpus(source: &str, names: &[&str]) -> Corpus {
        let entries: Vec<_> = names.iter().map(|n| json!({ "name": n })).collect();
        let mut builder = CorpusBuilder::new();
        builder
            .add_document(source, json!({ "exercises": entries }), Some("exercises"))
            .unwrap();
        builder.finish().0
    }

    async fn retriever(names: &[&str]) -> Retriever {
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        let snapshot = Snapshot::build(corpus("exercises.json", names), embedder.as_ref())
            .await
            .unwrap();
        Retriever::new(embedder).with_snapshot(snapshot)
    }

    #[tokio::test]
    async fn test_push_up_form() {
        let retriever = retriever(&["Push-up", "Squat"]).await;
        let hits = retriever.query("push up form", 1).await.unwrap();
        assert_eq!(hits.ids(), vec![0]);

        let records = hits.records();
        assert_eq!(records[0].record.text, "{'name': 'Push-up'}");
    }

    #[tokio::test]
    async fn test_own_text_is_top_hit() {
        let names = ["Barbell Deadlift", "Dumbbell Curl", "Plank", "Walking Lunge"];
        let retriever = retriever(&names).await;
        let snapshot = retriever.snapshot().unwrap();

        for record in snapshot.corpus() {
            let hits = retriever.query(&record.text, 2).await.unwrap();
            assert_eq!(hits.neighbors()[0].id, record.seq_num);
            assert!(hits.neighbors()[0].distance < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_query_bounds() {
        let retriever = retriever(&["Plank", "Row", "Dip"]).await;

        let hits = retriever.query("plank hold", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        let mut ids = hits.ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(hits
            .neighbors()
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance));

        assert!(matches!(
            retriever.query("plank", 0).await,
            Err(SpotterError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unbuilt_rejects_queries() {
        let retriever = Retriever::new(Arc::new(HashingEmbedder::new(8).unwrap()));
        assert!(!retriever.is_built());
        assert!(matches!(
            retriever.query("squat", 3).await,
            Err(SpotterError::IndexNotBuilt)
        ));
    }

    #[tokio::test]
    async fn test_empty_snapshot_returns_nothing() {
        let retriever =
            Retriever::new(Arc::new(FailingEmbedder)).with_snapshot(Snapshot::empty());
        assert!(retriever.query("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_empty() {
        let embedder = Arc::new(FailingEmbedder);
        let snapshot = Snapshot::build(corpus("x.json", &["Row"]), embedder.as_ref())
            .await
            .unwrap();
        let retriever = Retriever::new(embedder).with_snapshot(snapshot);
        assert!(retriever.retrieve("row", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_timeout_degrades_to_empty() {
        let embedder = Arc::new(SlowEmbedder);
        let snapshot = Snapshot::build(corpus("x.json", &["Row"]), embedder.as_ref())
            .await
            .unwrap();
        let retriever = Retriever::new(embedder)
            .with_query_timeout(Duration::from_millis(20))
            .with_snapshot(snapshot);
        assert!(retriever.query("row", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hits_resolve_against_their_snapshot() {
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        let retriever = retriever(&["Push-up", "Squat"]).await;
        let before = retriever.query("squat", 2).await.unwrap();

        let replacement = Snapshot::build(corpus("other.json", &["Squat"]), embedder.as_ref())
            .await
            .unwrap();
        let previous = retriever.publish(replacement);
        assert!(previous.is_some());

        let records = before.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.record.source == "exercises.json"));

        let after = retriever.retrieve("squat", 2).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].record.source, "other.json");
    }

    #[tokio::test]
    async fn test_stale_ids_are_dropped() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let full = corpus("x.json", &["Row", "Dip", "Plank"]);
        let vectors: Vec<Vec<f32>> = full.texts().iter().map(|t| embedder.embed_text(t)).collect();
        let index = FlatL2Index::build(&vectors).unwrap();

        let stale = corpus("x.json", &["Row"]);
        let snapshot = Snapshot::new(stale, index);
        let retriever = Retriever::new(Arc::new(embedder)).with_snapshot(snapshot);

        let hits = retriever.query("plank", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        let records = hits.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.seq_num, 0);

        let snapshot = retriever.snapshot().unwrap();
        let resolved = snapshot.corpus().resolve(&hits.ids());
        let kept: Vec<&Record> = records.iter().map(|r| &r.record).collect();
        assert_eq!(kept, resolved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_during_publish() {
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        let retriever = Arc::new(retriever(&["Push-up", "Squat", "Row"]).await);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let retriever = retriever.clone();
            tasks.push(tokio::spawn(async move {
                let question = if i % 2 == 0 { "squat" } else { "push up" };
                retriever.retrieve(question, 3).await.unwrap()
            }));
        }

        let replacement = Snapshot::build(
            corpus("swapped.json", &["Squat", "Lunge", "Curl"]),
            embedder.as_ref(),
        )
        .await
        .unwrap();
        retriever.publish(replacement);

        for task in tasks {
            let records = task.await.unwrap();
            assert_eq!(records.len(), 3);
            let source = &records[0].record.source;
            assert!(records.iter().all(|r| &r.record.source == source));
        }
    }
}
