//! CLI module for Spotter.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::corpus::SourceSpec;
use clap::{Parser, Subcommand};

/// Spotter - fitness and nutrition answers grounded in your own records
///
/// Builds a searchable index over exercise, stretch, food and meal JSON files
/// and answers questions with the closest records as context.
#[derive(Parser, Debug)]
#[command(name = "spotter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the corpus and index from the source files and publish it
    Build {
        /// Source file as PATH or PATH:FIELD (repeatable; defaults to the configured sources)
        #[arg(short, long = "source", value_name = "PATH[:FIELD]")]
        sources: Vec<SourceSpec>,
    },

    /// Search for the records closest to a query
    Search {
        /// Search query
        query: String,

        /// Number of results (defaults to retrieval.top_k)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Ask a question and get an answer grounded in the closest records
    Ask {
        /// The question to ask
        question: String,

        /// Number of records to use as context (defaults to retrieval.top_k)
        #[arg(short)]
        k: Option<usize>,

        /// LLM model to use for response generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show the current index generation
    Inspect,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
