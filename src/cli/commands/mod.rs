//! CLI command implementations.

mod ask;
mod build;
mod config;
mod inspect;
mod search;
mod serve;

pub use ask::run_ask;
pub use build::run_build;
pub use config::run_config;
pub use inspect::run_inspect;
pub use search::run_search;
pub use serve::run_serve;
