//! # Citegraph Graph
//!
//! The graph side of the pipeline: the [`GraphStore`] seam with its Neo4j and
//! in-memory implementations, the batching loader that drives it, and the
//! post-load verification report.

pub mod client;
pub mod cypher;
pub mod error;
pub mod loader;
pub mod memory;
pub mod schema;
pub mod store;
pub mod verify;

pub use client::Neo4jStore;
pub use error::{GraphError, GraphResult};
pub use loader::{BatchLoader, CancelFlag, LoadError, LoadReport, LoadSettings};
pub use memory::{Fault, MemoryGraph};
pub use store::{BatchOutcome, GraphStore};
pub use verify::{verify, QualityCount, VerificationReport, DATA_QUALITY_CHECKS};
