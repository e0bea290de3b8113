//! Build command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::corpus::SourceSpec;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the build command.
pub async fn run_build(sources: &[SourceSpec], settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Build, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Building corpus and embedding records...");
    let result = orchestrator.build(sources).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Build failed: {}", e));
            Output::info("The previously published index is unchanged.");
            return Err(e.into());
        }
    };

    let summary = &result.summary;
    for warning in &summary.warnings {
        Output::warning(warning);
    }

    Output::success(&format!(
        "Indexed {} records from {} sources ({} skipped)",
        summary.records, summary.files_read, summary.files_skipped
    ));
    Output::kv("Generation", &result.manifest.generation_id.to_string());
    Output::kv("Embedder", &result.manifest.embedder);
    Output::kv("Dimension", &result.manifest.dimension.to_string());

    Ok(())
}
