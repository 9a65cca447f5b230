//! # Citegraph Pipeline
//!
//! Stages turn the relational working set into upsert instructions; the
//! orchestrator runs them in two tiers (nodes, then edges) against a
//! [`GraphStore`](citegraph_graph::GraphStore) and reports per-stage results.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod stage;
pub mod stages;

pub use context::RunContext;
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{Pipeline, RunReport, StageSelection};
pub use stage::{StageId, StageReport, StageState, Tier};
