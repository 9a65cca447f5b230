//! Edge kinds, edge identity and edge upsert instructions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::node::NodeKind;
use super::value::{AttrValue, Attributes};
use crate::error::CiteGraphError;

/// The relationship kinds of the citation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Authored,
    AffiliatedWith,
    TaggedWith,
    PublishedIn,
    Cited,
    RelatedTo,
}

/// How an upsert combines with an edge that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Attributes are overwritten with the latest values seen.
    Overwrite,
    /// `first_seen`/`last_seen` track the observed value: both are set on
    /// create, only `last_seen` moves (to the max) on match.
    SeenRange,
}

impl EdgeKind {
    /// Every edge kind, in load order.
    pub const ALL: [EdgeKind; 6] = [
        EdgeKind::Authored,
        EdgeKind::AffiliatedWith,
        EdgeKind::TaggedWith,
        EdgeKind::PublishedIn,
        EdgeKind::Cited,
        EdgeKind::RelatedTo,
    ];

    /// The Neo4j relationship type.
    pub fn rel_type(&self) -> &'static str {
        match self {
            Self::Authored => "AUTHORED",
            Self::AffiliatedWith => "AFFILIATED_WITH",
            Self::TaggedWith => "TAGGED_WITH",
            Self::PublishedIn => "PUBLISHED_IN",
            Self::Cited => "CITED",
            Self::RelatedTo => "RELATED_TO",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authored => "authored",
            Self::AffiliatedWith => "affiliated_with",
            Self::TaggedWith => "tagged_with",
            Self::PublishedIn => "published_in",
            Self::Cited => "cited",
            Self::RelatedTo => "related_to",
        }
    }

    /// `(source kind, target kind)` of this relationship.
    pub fn endpoints(&self) -> (NodeKind, NodeKind) {
        match self {
            Self::Authored => (NodeKind::Author, NodeKind::Work),
            Self::AffiliatedWith => (NodeKind::Author, NodeKind::Institution),
            Self::TaggedWith => (NodeKind::Work, NodeKind::Topic),
            Self::PublishedIn => (NodeKind::Work, NodeKind::Source),
            Self::Cited => (NodeKind::Work, NodeKind::Work),
            Self::RelatedTo => (NodeKind::Work, NodeKind::Work),
        }
    }

    /// Symmetric kinds are identified by the unordered endpoint pair.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::RelatedTo)
    }

    pub fn merge_rule(&self) -> MergeRule {
        match self {
            Self::AffiliatedWith => MergeRule::SeenRange,
            _ => MergeRule::Overwrite,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rel_type())
    }
}

impl FromStr for EdgeKind {
    type Err = CiteGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "authored" => Ok(Self::Authored),
            "affiliated_with" => Ok(Self::AffiliatedWith),
            "tagged_with" => Ok(Self::TaggedWith),
            "published_in" => Ok(Self::PublishedIn),
            "cited" => Ok(Self::Cited),
            "related_to" => Ok(Self::RelatedTo),
            _ => Err(CiteGraphError::UnknownEdgeKind(s.to_string())),
        }
    }
}

/// Identity of an edge. For symmetric kinds the endpoints are normalized so
/// that `source <= target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
}

impl EdgeKey {
    pub fn new(kind: EdgeKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        let (source, target) = (source.into(), target.into());
        if kind.is_symmetric() && target < source {
            Self { kind, source: target, target: source }
        } else {
            Self { kind, source, target }
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.source, self.kind, self.target)
    }
}

/// Insert-or-update of a single edge.
///
/// `seen` is the observed value for [`MergeRule::SeenRange`] kinds and is
/// ignored for overwrite kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpsert {
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    pub attrs: Attributes,
    pub seen: Option<i64>,
}

impl EdgeUpsert {
    /// Create an upsert; symmetric kinds get normalized endpoints.
    pub fn new(kind: EdgeKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        let key = EdgeKey::new(kind, source, target);
        Self {
            kind,
            source: key.source,
            target: key.target,
            attrs: Attributes::new(),
            seen: None,
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn seen(mut self, observed: Option<i64>) -> Self {
        self.seen = observed;
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.kind, self.source.clone(), self.target.clone())
    }
}
