//! Spotter - fitness and nutrition question answering over your own records
//!
//! Spotter turns a folder of exercise, stretch, food and meal JSON files into
//! a searchable index and answers questions with the closest records as
//! context.
//!
//! # Overview
//!
//! Spotter allows you to:
//! - Flatten heterogeneous JSON sources into one numbered record list
//! - Embed every record and build an exact L2 index over the vectors
//! - Publish each build atomically as a new on-disk generation
//! - Search the index and ask questions, from the CLI or over HTTP
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `corpus` - Source parsing and record numbering
//! - `embedding` - Embedding generation
//! - `index` - Flat L2 index and its on-disk formats
//! - `retrieval` - Published snapshots and the query path
//! - `vector_store` - Generation persistence
//! - `rag` - RAG engine for question answering
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use spotter::config::Settings;
//! use spotter::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     // Build from the configured sources and publish a new generation
//!     let result = orchestrator.build(&[]).await?;
//!     println!("Indexed {} records", result.summary.records);
//!
//!     let retriever = orchestrator.retriever()?;
//!     for hit in retriever.retrieve("push up form", 3).await? {
//!         println!("{:.3} {}", hit.distance, hit.record.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod retrieval;
pub mod vector_store;

pub use error::{Result, SpotterError};
