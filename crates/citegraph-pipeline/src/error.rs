//! Pipeline error types.

use std::ops::Range;

use citegraph_core::CiteGraphError;
use citegraph_graph::GraphError;
use citegraph_source::SourceError;
use thiserror::Error;

use crate::orchestrator::RunReport;
use crate::stage::StageId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] CiteGraphError),

    #[error("Source error while preparing the run: {0}")]
    Source(#[from] SourceError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Stage '{stage}' needs completed node stages first: {}", names(.missing))]
    DependencyNotMet { stage: StageId, missing: Vec<StageId> },

    #[error("Stage '{stage}' failed after {committed_batches} committed batches: {reason}")]
    StageFailed {
        stage: StageId,
        committed_batches: usize,
        rows: Option<Range<usize>>,
        reason: String,
        report: Box<RunReport>,
    },

    #[error("Stage '{stage}' cancelled after {committed_batches} committed batches")]
    Cancelled {
        stage: StageId,
        committed_batches: usize,
        report: Box<RunReport>,
    },

    #[error("Blocking task failed: {0}")]
    Task(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

fn names(stages: &[StageId]) -> String {
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    /// The partial run report, when stages already ran.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::StageFailed { report, .. } | Self::Cancelled { report, .. } => Some(report),
            _ => None,
        }
    }
}
