//! # Citegraph Source
//!
//! The relational side of the pipeline: a SQLite-backed OpenAlex mirror,
//! the parameterized extraction queries run against it, chunked row streams
//! over id lists, the working-set materializer and the anti-join citation
//! partition.

pub mod migrations;
pub mod partition;
pub mod pool;
pub mod queries;
pub mod source;
pub mod stream;
pub mod working_set;

#[cfg(any(test, feature = "test-fixture"))]
pub mod fixture;

pub use partition::{Edge, Partition, PartitionStats};
pub use pool::{SourceError, SourcePool, SourceResult};
pub use source::{RelationalSource, SqliteSource};
pub use stream::RowChunks;
pub use working_set::WorkingSet;
