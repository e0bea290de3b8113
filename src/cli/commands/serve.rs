//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for search and question answering, plus a
//! server-sent-events endpoint that streams answers line by line.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::SpotterError;
use crate::orchestrator::Orchestrator;
use crate::rag::{into_lines, Generator, OpenAIGenerator, RagEngine};
use crate::retrieval::{RetrievedRecord, Retriever};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, KeepAliveStream, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

const APOLOGY: &str = "Sorry, I encountered an error processing your request.";

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    retriever: Arc<Retriever>,
    engine: RagEngine,
    top_k: usize,
}

impl AppState {
    fn new(orchestrator: Orchestrator, generator: Arc<dyn Generator>) -> crate::error::Result<Self> {
        let retriever = orchestrator.retriever()?;
        let engine = orchestrator.rag_engine(retriever.clone(), generator);
        let top_k = orchestrator.settings().retrieval.top_k;
        Ok(Self {
            orchestrator,
            retriever,
            engine,
            top_k,
        })
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    if std::env::var("OPENAI_API_KEY").map_or(true, |k| k.is_empty()) {
        warn!("OPENAI_API_KEY is not set; /chat endpoints will fail");
    }

    let generator = Arc::new(OpenAIGenerator::new(&settings.rag)?);
    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState::new(orchestrator, generator)?);

    let records = state.retriever.snapshot().map(|s| s.len()).ok();
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Spotter API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    match records {
        Some(n) => Output::info(&format!("Serving {} records", n)),
        None => Output::warning("No index built yet; run 'spotter build' then POST /reload"),
    }
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Search", "POST /search");
    Output::kv("Chat", "POST /chat");
    Output::kv("Chat (SSE)", "GET  /chat/stream?message=...");
    Output::kv("Reload index", "POST /reload");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/chat", post(chat))
        .route("/chat/stream", get(chat_stream))
        .route("/reload", post(reload))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedRecord>,
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    sources: Vec<RetrievedRecord>,
}

#[derive(Deserialize)]
struct StreamParams {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    reloaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_id: Option<String>,
    records: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: SpotterError) -> Response {
    let status = match e {
        SpotterError::IndexNotBuilt => StatusCode::SERVICE_UNAVAILABLE,
        SpotterError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.retriever.snapshot().map(|s| s.len()).unwrap_or(0);
    Json(serde_json::json!({ "status": "ok", "records": records }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Response {
    let k = req.k.unwrap_or(state.top_k);
    match state.retriever.retrieve(&req.query, k).await {
        Ok(results) => Json(SearchResponse { results }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    match state.engine.ask(&req.message).await {
        Ok(response) => Json(ChatResponse {
            answer: response.answer,
            sources: response.sources,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>> {
    let events: BoxStream<'static, Result<Event, Infallible>> = match state.engine.ask_stream(&params.message).await {
        Ok(streamed) => into_lines(streamed.deltas)
            .map(|line| {
                let event = match line {
                    // SSE data cannot carry carriage returns
                    Ok(line) => Event::default().data(line.replace('\r', "")),
                    Err(e) => {
                        error!("Answer stream failed: {}", e);
                        Event::default().data(APOLOGY)
                    }
                };
                Ok(event)
            })
            .boxed(),
        Err(e) => {
            error!("Failed to start answer stream: {}", e);
            stream::iter([Ok(Event::default().data(APOLOGY))]).boxed()
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn reload(State(state): State<Arc<AppState>>) -> Response {
    let task_state = state.clone();
    let result =
        tokio::task::spawn_blocking(move || task_state.orchestrator.reload(&task_state.retriever))
            .await;

    match result {
        Ok(Ok(manifest)) => Json(ReloadResponse {
            reloaded: manifest.is_some(),
            generation_id: manifest.map(|m| m.generation_id.to_string()),
            records: state.retriever.snapshot().map(|s| s.len()).unwrap_or(0),
        })
        .into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => error_response(SpotterError::Storage(format!("Reload task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::embedding::{EmbeddingProvider, HashingEmbedder};
    use crate::error::Result;
    use crate::rag::TextStream;
    use async_trait::async_trait;
    use axum::body::to_bytes;

    struct CannedGenerator;

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok("Keep your back straight.".to_string())
        }

        async fn stream(&self, _system: &str, _prompt: &str) -> Result<TextStream> {
            Ok(stream::iter([Ok("Keep your\nback straight.".to_string())]).boxed())
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl Generator for BrokenGenerator {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Err(SpotterError::Generation("model overloaded".to_string()))
        }

        async fn stream(&self, _system: &str, _prompt: &str) -> Result<TextStream> {
            Ok(stream::iter([Err(SpotterError::Generation("connection reset".to_string()))]).boxed())
        }
    }

    async fn state(dir: &std::path::Path) -> Arc<AppState> {
        state_with(dir, Arc::new(CannedGenerator)).await
    }

    async fn state_with(dir: &std::path::Path, generator: Arc<dyn Generator>) -> Arc<AppState> {
        let sources = dir.join("sources");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(
            sources.join("exercises.json"),
            r#"{"exercises": [{"name": "Push-up"}, {"name": "Squat"}]}"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.general.data_dir = dir.join("data").to_string_lossy().to_string();
        settings.corpus.base_dir = Some(sources.to_string_lossy().to_string());
        settings.embedding.provider = EmbeddingProvider::Hashing;
        settings.embedding.dimensions = 384;

        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        let orchestrator = Orchestrator::with_components(settings, Prompts::default(), embedder);
        Arc::new(AppState::new(orchestrator, generator).unwrap())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn event_data(state: Arc<AppState>, message: &str) -> Vec<String> {
        let response = chat_stream(
            State(state),
            Query(StreamParams {
                message: message.to_string(),
            }),
        )
        .await
        .into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data: ").map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_chat_stream_sends_one_event_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        state.orchestrator.build(&[]).await.unwrap();
        reload(State(state.clone())).await;

        let data = event_data(state, "how do I squat?").await;
        assert_eq!(data, vec!["Keep your", "back straight."]);
    }

    #[tokio::test]
    async fn test_chat_stream_apologises_once_on_error() {
        let dir = tempfile::tempdir().unwrap();

        // no index published yet
        let unbuilt = state(dir.path()).await;
        assert_eq!(event_data(unbuilt, "squat").await, vec![APOLOGY]);

        let broken = state_with(dir.path(), Arc::new(BrokenGenerator)).await;
        broken.orchestrator.build(&[]).await.unwrap();
        reload(State(broken.clone())).await;
        assert_eq!(event_data(broken, "squat").await, vec![APOLOGY]);
    }

    #[tokio::test]
    async fn test_search_before_and_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let response = search(
            State(state.clone()),
            Json(SearchRequest {
                query: "push up".to_string(),
                k: Some(1),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.orchestrator.build(&[]).await.unwrap();
        let response = reload(State(state.clone())).await;
        let body = body_json(response).await;
        assert_eq!(body["reloaded"], true);
        assert_eq!(body["records"], 2);

        let response = search(
            State(state.clone()),
            Json(SearchRequest {
                query: "push up form".to_string(),
                k: Some(1),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"][0]["seq_num"], 0);
        assert_eq!(body["results"][0]["text"], "{'name': 'Push-up'}");

        let body = body_json(health(State(state)).await.into_response()).await;
        assert_eq!(body["records"], 2);
    }

    #[tokio::test]
    async fn test_chat_and_invalid_k() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        state.orchestrator.build(&[]).await.unwrap();
        reload(State(state.clone())).await;

        let response = chat(
            State(state.clone()),
            Json(ChatRequest {
                message: "how do I squat?".to_string(),
            }),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["answer"], "Keep your back straight.");
        assert_eq!(body["sources"].as_array().unwrap().len(), 2);

        let response = search(
            State(state),
            Json(SearchRequest {
                query: "squat".to_string(),
                k: Some(0),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
