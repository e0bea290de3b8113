//! RAG response generation.

use super::context::{format_context, format_sources_for_display};
use super::generator::{Generator, TextStream};
use super::intent::Intent;
use crate::config::Prompts;
use crate::error::Result;
use crate::retrieval::{RetrievedRecord, Retriever};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default number of records retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// RAG engine for question answering.
pub struct RagEngine {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    prompts: Prompts,
    top_k: usize,
}

/// A rendered prompt and the records it was built from.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub intent: Intent,
    pub prompt: String,
    pub sources: Vec<RetrievedRecord>,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
            prompts: Prompts::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set how many records are retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Retrieve context for a question and render its prompt.
    ///
    /// With no matching records the prompt is rendered with an empty context.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn prepare(&self, question: &str) -> Result<PreparedPrompt> {
        let sources = self.retriever.retrieve(question, self.top_k).await?;
        let intent = Intent::classify(question);
        debug!("Intent {} with {} records", intent, sources.len());

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), format_context(&sources));

        let prompt = self
            .prompts
            .render_with_custom(intent.template(&self.prompts.rag), &vars);

        Ok(PreparedPrompt {
            intent,
            prompt,
            sources,
        })
    }

    /// Ask a single question and get a response.
    pub async fn ask(&self, question: &str) -> Result<RagResponse> {
        info!("Processing question: {}", question);
        let prepared = self.prepare(question).await?;
        let answer = self
            .generator
            .complete(&self.prompts.rag.system, &prepared.prompt)
            .await?;

        Ok(RagResponse {
            answer,
            intent: prepared.intent,
            sources: prepared.sources,
        })
    }

    /// Ask a question and stream the answer as it is generated.
    pub async fn ask_stream(&self, question: &str) -> Result<RagStream> {
        info!("Streaming answer for: {}", question);
        let prepared = self.prepare(question).await?;
        let deltas = self
            .generator
            .stream(&self.prompts.rag.system, &prepared.prompt)
            .await?;

        Ok(RagStream {
            intent: prepared.intent,
            sources: prepared.sources,
            deltas,
        })
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    pub intent: Intent,
    /// Records the answer was conditioned on, closest first.
    pub sources: Vec<RetrievedRecord>,
}

impl RagResponse {
    /// Format the response for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            output.push_str(&format_sources_for_display(&self.sources));
        }

        output
    }
}

/// A streaming answer: sources up front, text as it arrives.
pub struct RagStream {
    pub intent: Intent,
    pub sources: Vec<RetrievedRecord>,
    pub deltas: TextStream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusBuilder;
    use crate::embedding::HashingEmbedder;
    use crate::error::SpotterError;
    use crate::retrieval::Snapshot;
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use serde_json::json;

    /// Echoes the prompt back, streaming it in small pieces.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }

        async fn stream(&self, _system: &str, prompt: &str) -> Result<TextStream> {
            let pieces: Vec<Result<String>> = prompt
                .chars()
                .collect::<Vec<_>>()
                .chunks(7)
                .map(|c| Ok(c.iter().collect()))
                .collect();
            Ok(stream::iter(pieces).boxed())
        }
    }

    async fn engine() -> RagEngine {
        let mut builder = CorpusBuilder::new();
        builder
            .add_document(
                "exercises.json",
                json!({"exercises": [{"name": "Push-up"}, {"name": "Squat"}]}),
                None,
            )
            .unwrap();
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        let snapshot = Snapshot::build(builder.finish().0, embedder.as_ref())
            .await
            .unwrap();
        let retriever = Arc::new(Retriever::new(embedder).with_snapshot(snapshot));

        let mut prompts = Prompts::default();
        prompts.rag.workout_plan = "PLAN {{question}}\n{{context}}".to_string();
        prompts.rag.concise_answer = "SHORT {{question}}\n{{context}}".to_string();

        RagEngine::new(retriever, Arc::new(EchoGenerator))
            .with_prompts(prompts)
            .with_top_k(1)
    }

    #[tokio::test]
    async fn test_ask_uses_intent_template_and_context() {
        let engine = engine().await;

        let response = engine.ask("push up form").await.unwrap();
        assert_eq!(response.intent, Intent::General);
        assert_eq!(response.answer, "SHORT push up form\n{'name': 'Push-up'}");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].record.seq_num, 0);

        let response = engine.ask("squat workout plan").await.unwrap();
        assert_eq!(response.intent, Intent::WorkoutPlan);
        assert!(response.answer.starts_with("PLAN squat workout plan\n"));
    }

    #[tokio::test]
    async fn test_ask_stream_yields_whole_answer() {
        let engine = engine().await;
        let streamed = engine.ask_stream("push up form").await.unwrap();
        assert_eq!(streamed.sources.len(), 1);

        let text: Vec<String> = streamed
            .deltas
            .map(|d| d.unwrap())
            .collect()
            .await;
        assert_eq!(text.concat(), "SHORT push up form\n{'name': 'Push-up'}");
    }

    #[tokio::test]
    async fn test_unbuilt_index_is_an_error() {
        let retriever = Arc::new(Retriever::new(Arc::new(HashingEmbedder::new(8).unwrap())));
        let engine = RagEngine::new(retriever, Arc::new(EchoGenerator));
        assert!(matches!(
            engine.ask("anything").await,
            Err(SpotterError::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_format_for_display() {
        let response = RagResponse {
            answer: "Keep your core tight.".to_string(),
            intent: Intent::General,
            sources: Vec::new(),
        };
        assert_eq!(response.format_for_display(), "Keep your core tight.");
    }
}
