//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, k: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let k = k.unwrap_or(settings.retrieval.top_k);
    let orchestrator = Orchestrator::new(settings)?;
    let retriever = orchestrator.retriever()?;

    let spinner = Output::spinner("Searching...");
    let results = retriever.retrieve(query, k).await;
    spinner.finish_and_clear();

    match results {
        Ok(records) => {
            if records.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", records.len()));

                for hit in &records {
                    Output::record_result(
                        hit.record.seq_num,
                        &hit.record.source,
                        hit.record.label.as_deref(),
                        hit.distance,
                        &hit.record.text,
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
