//! Node kinds and node upsert instructions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::value::{AttrValue, Attributes};
use crate::error::CiteGraphError;

/// The node kinds of the citation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Work,
    Author,
    Institution,
    Topic,
    Source,
}

impl NodeKind {
    /// Every node kind, in load order.
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Work,
        NodeKind::Author,
        NodeKind::Institution,
        NodeKind::Topic,
        NodeKind::Source,
    ];

    /// The Neo4j node label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Author => "Author",
            Self::Institution => "Institution",
            Self::Topic => "Topic",
            Self::Source => "Source",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Author => "author",
            Self::Institution => "institution",
            Self::Topic => "topic",
            Self::Source => "source",
        }
    }

    /// Property names this kind carries besides `id`.
    pub fn attribute_names(&self) -> &'static [&'static str] {
        match self {
            Self::Work => &[
                "doi",
                "title",
                "display_name",
                "publication_year",
                "publication_date",
                "type",
                "cited_by_count",
                "is_retracted",
                "is_paratext",
                "language",
                "in_scope",
            ],
            Self::Author => &[
                "orcid",
                "display_name",
                "display_name_alternatives",
                "works_count",
                "cited_by_count",
            ],
            Self::Institution => &[
                "ror",
                "display_name",
                "country_code",
                "type",
                "homepage_url",
                "works_count",
                "cited_by_count",
            ],
            Self::Topic => &[
                "display_name",
                "subfield_id",
                "subfield_display_name",
                "field_id",
                "field_display_name",
                "domain_id",
                "domain_display_name",
                "description",
                "keywords",
                "works_count",
                "cited_by_count",
            ],
            Self::Source => &[
                "issn_l",
                "issn",
                "display_name",
                "publisher",
                "works_count",
                "cited_by_count",
                "is_oa",
                "is_in_doaj",
                "homepage_url",
            ],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NodeKind {
    type Err = CiteGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "work" | "works" => Ok(Self::Work),
            "author" | "authors" => Ok(Self::Author),
            "institution" | "institutions" => Ok(Self::Institution),
            "topic" | "topics" => Ok(Self::Topic),
            "source" | "sources" => Ok(Self::Source),
            _ => Err(CiteGraphError::UnknownNodeKind(s.to_string())),
        }
    }
}

/// Insert-or-update of a single node, keyed by `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpsert {
    pub kind: NodeKind,
    pub id: String,
    pub attrs: Attributes,
}

impl NodeUpsert {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            attrs: Attributes::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }
}
