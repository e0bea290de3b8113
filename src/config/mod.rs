//! Configuration module for Spotter.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    CorpusSettings, EmbeddingSettings, GeneralSettings, PromptSettings, RagSettings,
    RetrievalSettings, ServerSettings, Settings,
};
