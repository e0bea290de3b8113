//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::{into_lines, OpenAIGenerator};
use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;

/// Run the ask command, printing the answer line by line as it streams in.
pub async fn run_ask(
    question: &str,
    k: Option<usize>,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let mut generator = OpenAIGenerator::new(&settings.rag)?;
    if let Some(model) = model {
        generator = generator.with_model(&model);
    }

    let k = k.unwrap_or(settings.retrieval.top_k);
    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator
        .rag_engine(orchestrator.retriever()?, Arc::new(generator))
        .with_top_k(k);

    let spinner = Output::spinner("Searching records...");
    let streamed = engine.ask_stream(question).await;
    spinner.finish_and_clear();

    let streamed = match streamed {
        Ok(streamed) => streamed,
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    };

    if streamed.sources.is_empty() {
        Output::warning("No matching records; answering without context.");
    }

    println!();
    let mut lines = into_lines(streamed.deltas);
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => println!("{}", line),
            Err(e) => {
                Output::error(&format!("Answer stream failed: {}", e));
                return Err(e.into());
            }
        }
    }

    if !streamed.sources.is_empty() {
        Output::header("Sources");
        for hit in &streamed.sources {
            Output::record_result(
                hit.record.seq_num,
                &hit.record.source,
                hit.record.label.as_deref(),
                hit.distance,
                &hit.record.text,
            );
        }
    }

    Ok(())
}
