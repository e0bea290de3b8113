//! Persistence for built indexes.
//!
//! Every build is written as a self-contained generation directory holding
//! the index artifact, the embedding matrix, the record database and a
//! manifest. A `CURRENT` file names the generation being served; it is only
//! replaced once every file of the new generation is on disk, so a failed
//! build never disturbs what is already published.

mod generation;
mod sqlite;

pub use generation::{GenerationInfo, GenerationStore, Manifest};
pub use sqlite::SqliteRecordStore;
