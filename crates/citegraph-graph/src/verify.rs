//! Post-load verification: counts, connectivity ratios and data-quality
//! counts.

use std::fmt;

use citegraph_core::{AttrValue, EdgeKind, NodeKind, ScopeConfig};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GraphResult;
use crate::store::GraphStore;

/// (node kind, edge kind) pairs whose connectivity is reported.
pub const CONNECTIVITY_CHECKS: &[(NodeKind, EdgeKind)] = &[
    (NodeKind::Work, EdgeKind::Authored),
    (NodeKind::Work, EdgeKind::TaggedWith),
    (NodeKind::Work, EdgeKind::PublishedIn),
    (NodeKind::Author, EdgeKind::AffiliatedWith),
];

/// What a data-quality check counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRule {
    /// The property is set.
    Present,
    /// The property is boolean `true`.
    True,
    /// The property equals the scope's publication year.
    ScopeYear,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityCheck {
    pub name: &'static str,
    pub kind: NodeKind,
    pub property: &'static str,
    pub rule: QualityRule,
}

const fn check(
    name: &'static str,
    kind: NodeKind,
    property: &'static str,
    rule: QualityRule,
) -> QualityCheck {
    QualityCheck {
        name,
        kind,
        property,
        rule,
    }
}

pub const DATA_QUALITY_CHECKS: &[QualityCheck] = &[
    check("works with title", NodeKind::Work, "title", QualityRule::Present),
    check("authors with name", NodeKind::Author, "display_name", QualityRule::Present),
    check("works in scope year", NodeKind::Work, "publication_year", QualityRule::ScopeYear),
    check("authors with ORCID", NodeKind::Author, "orcid", QualityRule::Present),
    check("institutions with country", NodeKind::Institution, "country_code", QualityRule::Present),
    check("open access sources", NodeKind::Source, "is_oa", QualityRule::True),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeCount {
    pub kind: NodeKind,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeCount {
    pub kind: EdgeKind,
    pub count: u64,
}

/// Fraction of `node_kind` nodes with at least one `edge_kind` edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connectivity {
    pub node_kind: NodeKind,
    pub edge_kind: EdgeKind,
    pub connected: u64,
    pub total: u64,
    pub ratio: f64,
}

/// Nodes of `kind` passing one data-quality check, out of all `kind` nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCount {
    pub name: &'static str,
    pub kind: NodeKind,
    pub property: &'static str,
    pub rule: QualityRule,
    pub count: u64,
    pub total: u64,
}

/// Read-only summary of the loaded graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub nodes: Vec<NodeCount>,
    pub edges: Vec<EdgeCount>,
    pub connectivity: Vec<Connectivity>,
    pub quality: Vec<QualityCount>,
    /// Suspicious but acceptable findings, e.g. an empty edge kind.
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn node_count(&self, kind: NodeKind) -> u64 {
        self.nodes.iter().find(|n| n.kind == kind).map_or(0, |n| n.count)
    }

    pub fn edge_count(&self, kind: EdgeKind) -> u64 {
        self.edges.iter().find(|e| e.kind == kind).map_or(0, |e| e.count)
    }

    pub fn connectivity(&self, node_kind: NodeKind, edge_kind: EdgeKind) -> Option<&Connectivity> {
        self.connectivity
            .iter()
            .find(|c| c.node_kind == node_kind && c.edge_kind == edge_kind)
    }

    pub fn quality(&self, name: &str) -> Option<&QualityCount> {
        self.quality.iter().find(|q| q.name == name)
    }

    pub fn total_nodes(&self) -> u64 {
        self.nodes.iter().map(|n| n.count).sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges.iter().map(|e| e.count).sum()
    }
}

/// Run every count against the store. Never writes.
///
/// `scope` supplies the year the publication-year check expects.
pub async fn verify(store: &dyn GraphStore, scope: &ScopeConfig) -> GraphResult<VerificationReport> {
    let mut report = VerificationReport::default();

    for kind in NodeKind::ALL {
        let count = store.count_nodes(kind).await?;
        if count == 0 {
            report.warnings.push(format!("no {} nodes", kind.label()));
        }
        report.nodes.push(NodeCount { kind, count });
    }

    for kind in EdgeKind::ALL {
        let count = store.count_edges(kind).await?;
        if count == 0 {
            report.warnings.push(format!("no {} relationships", kind.rel_type()));
        }
        report.edges.push(EdgeCount { kind, count });
    }

    for &(node_kind, edge_kind) in CONNECTIVITY_CHECKS {
        let total = report.node_count(node_kind);
        let connected = if total == 0 {
            0
        } else {
            store.count_connected(node_kind, edge_kind).await?
        };
        let ratio = if total == 0 {
            0.0
        } else {
            connected as f64 / total as f64
        };
        report.connectivity.push(Connectivity {
            node_kind,
            edge_kind,
            connected,
            total,
            ratio,
        });
    }

    for check in DATA_QUALITY_CHECKS {
        let total = report.node_count(check.kind);
        let expected = match check.rule {
            QualityRule::Present => None,
            QualityRule::True => Some(AttrValue::Bool(true)),
            QualityRule::ScopeYear => Some(AttrValue::Int(scope.publication_year)),
        };
        let count = if total == 0 {
            0
        } else {
            store
                .count_with_property(check.kind, check.property, expected.as_ref())
                .await?
        };
        report.quality.push(QualityCount {
            name: check.name,
            kind: check.kind,
            property: check.property,
            rule: check.rule,
            count,
            total,
        });
    }

    for warning in &report.warnings {
        warn!(warning = %warning, "Verification warning");
    }
    info!(
        nodes = report.total_nodes(),
        relationships = report.total_edges(),
        warnings = report.warnings.len(),
        "Graph verified"
    );
    Ok(report)
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes")?;
        for n in &self.nodes {
            writeln!(f, "  {:<16} {:>10}", n.kind.label(), n.count)?;
        }
        writeln!(f, "Relationships")?;
        for e in &self.edges {
            writeln!(f, "  {:<16} {:>10}", e.kind.rel_type(), e.count)?;
        }
        writeln!(f, "Connectivity")?;
        for c in &self.connectivity {
            writeln!(
                f,
                "  {:<12} {:<16} {:>6.1}% ({}/{})",
                c.node_kind.label(),
                c.edge_kind.rel_type(),
                c.ratio * 100.0,
                c.connected,
                c.total
            )?;
        }
        writeln!(f, "Data quality")?;
        for q in &self.quality {
            writeln!(f, "  {:<29} {:>10} of {}", q.name, q.count, q.total)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings")?;
            for w in &self.warnings {
                writeln!(f, "  - {}", w)?;
            }
        }
        Ok(())
    }
}
