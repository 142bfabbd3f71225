//! # ezmetafetch
//!
//! Bulk metadata retrieval from NCBI Entrez E-utilities.
//!
//! A run searches a database for free-text terms, merges the hits with any
//! explicitly supplied IDs, fetches the records in batches and flattens the
//! XML into one table whose columns are dotted element paths.
//!
//! ## Architecture
//!
//! - [`models`]: request specs, task configs, pages, tables and result sets
//! - [`tasks`]: the paginated search task, the batched fetch task and their driver
//! - [`utils`]: HTTP transport, retry policy, rate-limited scheduler, chunking
//! - [`normalize`]: XML to flattened records
//! - [`orchestrator`]: the search-then-fetch pipeline ([`MetaFetcher`])
//! - [`columns`], [`input`], [`output`]: command-line conveniences around a run
//! - [`config`]: configuration management
//!
//! ```no_run
//! use ezmetafetch::{fetch_metadata, Config, FetchRequest};
//!
//! # async fn run() -> Result<(), ezmetafetch::FetchError> {
//! let request = FetchRequest::new("sra").terms(["human gut metagenome"]);
//! let result = fetch_metadata(&request, Config::default()).await?;
//! println!("{} records", result.metadata().len());
//! # Ok(())
//! # }
//! ```

pub mod columns;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod output;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{FetchError, Phase, TransientError};
pub use models::{FetchRecord, MetadataTable, ResultSet};
pub use orchestrator::{fetch_metadata, FetchRequest, MetaFetcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
