//! RAG (Retrieval-Augmented Generation) for fitness and nutrition questions.
//!
//! A question is classified into an [`Intent`], the closest records are
//! retrieved, and the intent's template is rendered with those records as
//! context before being handed to a [`Generator`].

pub mod context;
mod generator;
mod intent;
mod lines;
mod response;

pub use generator::{Generator, OpenAIGenerator, TextStream};
pub use intent::Intent;
pub use lines::{into_lines, LineChunker};
pub use response::{PreparedPrompt, RagEngine, RagResponse, RagStream, DEFAULT_TOP_K};
