//! Citegraph Core
//!
//! Domain model, error types and run configuration shared by the
//! relational source, the graph target and the pipeline orchestrator.

pub mod config;
pub mod error;
pub mod model;

pub use config::{
    GraphConfig, LoaderConfig, PartitionConfig, RunConfig, ScopeConfig, SourceConfig,
};
pub use error::{CiteGraphError, CiteGraphResult};
pub use model::{
    AttrValue, Attributes, EdgeKey, EdgeKind, EdgeUpsert, MergeRule, NodeKind, NodeUpsert,
    UpsertInstruction,
};
