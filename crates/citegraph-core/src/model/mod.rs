//! Graph-side data model: node and edge kinds, attribute values and the
//! upsert instructions that flow from extraction stages into the loader.

pub mod edge;
pub mod node;
pub mod value;

use serde::{Deserialize, Serialize};

pub use edge::{EdgeKey, EdgeKind, EdgeUpsert, MergeRule};
pub use node::{NodeKind, NodeUpsert};
pub use value::{AttrValue, Attributes};

/// One idempotent write against the target graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpsertInstruction {
    Node(NodeUpsert),
    Edge(EdgeUpsert),
}

impl UpsertInstruction {
    /// Short human-readable identity, used in error reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Node(n) => format!("{}:{}", n.kind.label(), n.id),
            Self::Edge(e) => e.key().to_string(),
        }
    }
}

impl From<NodeUpsert> for UpsertInstruction {
    fn from(n: NodeUpsert) -> Self {
        Self::Node(n)
    }
}

impl From<EdgeUpsert> for UpsertInstruction {
    fn from(e: EdgeUpsert) -> Self {
        Self::Edge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_edge_key_is_normalized() {
        let a = EdgeKey::new(EdgeKind::RelatedTo, "W9", "W2");
        let b = EdgeKey::new(EdgeKind::RelatedTo, "W2", "W9");
        assert_eq!(a, b);
        assert_eq!(a.source, "W2");
    }

    #[test]
    fn test_directed_edge_key_keeps_order() {
        let a = EdgeKey::new(EdgeKind::Cited, "W9", "W2");
        assert_eq!(a.source, "W9");
        assert_ne!(a, EdgeKey::new(EdgeKind::Cited, "W2", "W9"));
    }

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in EdgeKind::ALL {
            assert_eq!(kind.as_str().parse::<EdgeKind>().unwrap(), kind);
        }
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        assert!("citations".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn test_merge_rules() {
        assert_eq!(EdgeKind::AffiliatedWith.merge_rule(), MergeRule::SeenRange);
        assert_eq!(EdgeKind::TaggedWith.merge_rule(), MergeRule::Overwrite);
    }

    #[test]
    fn test_option_attr_maps_to_null() {
        let none: Option<String> = None;
        let node = NodeUpsert::new(NodeKind::Author, "A1")
            .with("orcid", none)
            .with("works_count", 4i64);
        assert!(node.attrs["orcid"].is_null());
        assert_eq!(node.attrs["works_count"].as_i64(), Some(4));
    }
}
