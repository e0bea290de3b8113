//! Inspect command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::GenerationStore;
use anyhow::Result;

/// Run the inspect command.
pub fn run_inspect(settings: Settings) -> Result<()> {
    let store = GenerationStore::new(settings.index_dir());

    let Some(info) = store.inspect_current()? else {
        Output::warning("No index has been built yet.");
        Output::info("Run 'spotter build' to create one.");
        return Ok(());
    };

    let manifest = &info.manifest;
    Output::header("Current generation");
    Output::kv("Id", &manifest.generation_id.to_string());
    Output::kv("Created", &manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    Output::kv("Path", &info.path.display().to_string());
    Output::kv("Embedder", &manifest.embedder);

    Output::header("Index");
    Output::kv("Vectors (ntotal)", &info.header.ntotal.to_string());
    Output::kv("Dimension", &info.header.dimension.to_string());
    Output::kv(
        "Matrix shape",
        &format!("({}, {})", info.matrix_shape.0, info.matrix_shape.1),
    );
    Output::kv("Records", &info.record_count.to_string());
    if info.record_count != info.header.ntotal {
        Output::warning("Record count does not match the number of vectors.");
    }

    Output::header("Sources");
    for (source, count) in &info.source_counts {
        Output::list_item(&format!("{} ({} records)", source, count));
    }
    if manifest.summary.files_skipped > 0 {
        Output::kv("Skipped at build", &manifest.summary.files_skipped.to_string());
    }
    for warning in &manifest.summary.warnings {
        Output::warning(warning);
    }

    let generations = store.list()?;
    if generations.len() > 1 {
        println!();
        Output::info(&format!(
            "{} generations on disk under {}",
            generations.len(),
            store.root().display()
        ));
    }

    Ok(())
}
