//! Answer generation backends.

use crate::config::RagSettings;
use crate::error::{Result, SpotterError};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;
use tracing::{debug, instrument};

/// A stream of answer text fragments.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Turns a rendered prompt into answer text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate the whole answer.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate the answer as a stream of text deltas.
    async fn stream(&self, system: &str, prompt: &str) -> Result<TextStream>;
}

/// OpenAI chat completions generator.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    /// Create a generator for the configured model.
    pub fn new(settings: &RagSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(
                settings.request_timeout_secs,
            ))?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    /// Use a different model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, system: &str, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| SpotterError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| SpotterError::Generation(e.to_string()))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SpotterError::Generation(e.to_string()))
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = self.request(system, prompt)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SpotterError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SpotterError::Generation("Empty response from LLM".to_string()))?;

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn stream(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let request = self.request(system, prompt)?;

        let stream = self.client.chat().create_stream(request).await.map_err(|e| {
            SpotterError::OpenAI(format!("Failed to start response stream: {}", e))
        })?;

        Ok(stream
            .filter_map(|item| async move {
                match item {
                    Ok(chunk) => chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .filter(|text| !text.is_empty())
                        .map(Ok),
                    Err(e) => Some(Err(SpotterError::OpenAI(e.to_string()))),
                }
            })
            .boxed())
    }
}
