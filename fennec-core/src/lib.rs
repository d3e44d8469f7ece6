//! # Fennec Core
//!
//! Business logic for the Fennec video search system: the durable store
//! (Postgres + pgvector), filesystem scanner, enrichment queue and
//! pipeline, model host adapters, offline clustering, and the read-side
//! query operations. The `fennec-ingest` and `fennec-server` binaries
//! are thin shells over this crate.

pub mod cluster;
pub mod error;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod scan;
pub mod settings;
pub mod store;
pub mod types;

pub use error::{FennecError, Result};
pub use pipeline::{DrainOutcome, Pipeline};
pub use query::QueryEngine;
pub use scan::Scanner;
pub use store::Store;
