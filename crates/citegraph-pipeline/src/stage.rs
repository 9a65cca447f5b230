//! Stage identities, states and reports.

use std::fmt;
use std::str::FromStr;

use citegraph_core::{CiteGraphError, EdgeKind, NodeKind};
use serde::Serialize;

/// Tier 1 loads nodes, Tier 2 loads edges between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Nodes,
    Edges,
}

/// One unit of the pipeline: a node kind or an edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Works,
    Authors,
    Institutions,
    Topics,
    Sources,
    Authored,
    AffiliatedWith,
    TaggedWith,
    PublishedIn,
    Cited,
    RelatedTo,
}

impl StageId {
    /// Canonical execution order.
    pub const ALL: [StageId; 11] = [
        StageId::Works,
        StageId::Authors,
        StageId::Institutions,
        StageId::Topics,
        StageId::Sources,
        StageId::Authored,
        StageId::AffiliatedWith,
        StageId::TaggedWith,
        StageId::PublishedIn,
        StageId::Cited,
        StageId::RelatedTo,
    ];

    pub fn tier(&self) -> Tier {
        match self {
            Self::Works | Self::Authors | Self::Institutions | Self::Topics | Self::Sources => {
                Tier::Nodes
            }
            _ => Tier::Edges,
        }
    }

    /// Every Tier 1 stage.
    pub fn node_stages() -> impl Iterator<Item = StageId> {
        Self::ALL.into_iter().filter(|s| s.tier() == Tier::Nodes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Works => "works",
            Self::Authors => "authors",
            Self::Institutions => "institutions",
            Self::Topics => "topics",
            Self::Sources => "sources",
            Self::Authored => "authored",
            Self::AffiliatedWith => "affiliated_with",
            Self::TaggedWith => "tagged_with",
            Self::PublishedIn => "published_in",
            Self::Cited => "cited",
            Self::RelatedTo => "related_to",
        }
    }

    pub fn node_kind(&self) -> Option<NodeKind> {
        match self {
            Self::Works => Some(NodeKind::Work),
            Self::Authors => Some(NodeKind::Author),
            Self::Institutions => Some(NodeKind::Institution),
            Self::Topics => Some(NodeKind::Topic),
            Self::Sources => Some(NodeKind::Source),
            _ => None,
        }
    }

    pub fn edge_kind(&self) -> Option<EdgeKind> {
        match self {
            Self::Authored => Some(EdgeKind::Authored),
            Self::AffiliatedWith => Some(EdgeKind::AffiliatedWith),
            Self::TaggedWith => Some(EdgeKind::TaggedWith),
            Self::PublishedIn => Some(EdgeKind::PublishedIn),
            Self::Cited => Some(EdgeKind::Cited),
            Self::RelatedTo => Some(EdgeKind::RelatedTo),
            _ => None,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = CiteGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| CiteGraphError::UnknownStage(s.to_string()))
    }
}

/// Per-stage state machine: `Pending -> Running -> Completed | Failed`.
/// A failed stage goes back to `Pending` when it is run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one stage did during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: StageId,
    pub tier: Tier,
    pub state: StageState,
    pub elapsed_ms: u64,
    pub rows_read: usize,
    pub instructions: usize,
    pub batches_committed: usize,
    pub applied: usize,
    pub dangling: usize,
    pub dangling_sample: Vec<String>,
    pub retries: usize,
    pub error: Option<String>,
}

impl StageReport {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            tier: stage.tier(),
            state: StageState::Pending,
            elapsed_ms: 0,
            rows_read: 0,
            instructions: 0,
            batches_committed: 0,
            applied: 0,
            dangling: 0,
            dangling_sample: Vec::new(),
            retries: 0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_round_trip() {
        for stage in StageId::ALL {
            assert_eq!(stage.as_str().parse::<StageId>().unwrap(), stage);
        }
        assert_eq!("Affiliated-With".parse::<StageId>().unwrap(), StageId::AffiliatedWith);
        assert!("coauthors".parse::<StageId>().is_err());
    }

    #[test]
    fn test_tiers_are_ordered() {
        let first_edge = StageId::ALL.iter().position(|s| s.tier() == Tier::Edges).unwrap();
        assert!(StageId::ALL[..first_edge].iter().all(|s| s.tier() == Tier::Nodes));
        assert!(StageId::ALL[first_edge..].iter().all(|s| s.tier() == Tier::Edges));
        assert_eq!(StageId::node_stages().count(), 5);
    }

    #[test]
    fn test_every_stage_maps_to_one_kind() {
        for stage in StageId::ALL {
            assert!(stage.node_kind().is_some() ^ stage.edge_kind().is_some());
        }
    }
}
