//! Citation partitioning against the working set.
//!
//! Every distinct edge lands in exactly one bucket:
//!
//! | source in S | target in S | bucket           |
//! |-------------|-------------|------------------|
//! | yes         | yes         | `internal`       |
//! | yes         | no          | `candidates_out` |
//! | no          | yes         | `incoming`       |
//! | no          | no          | `discarded`      |
//!
//! `outgoing` is the subset of `candidates_out` whose external target is cited
//! by at least `k` distinct in-scope works.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use crate::queries::links::ReferenceRow;
use crate::working_set::WorkingSet;

/// A directed citation edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl From<ReferenceRow> for Edge {
    fn from(row: ReferenceRow) -> Self {
        Self {
            source: row.citing,
            target: row.cited,
        }
    }
}

/// Which endpoint of an edge a join looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl Endpoint {
    fn of<'e>(&self, edge: &'e Edge) -> &'e str {
        match self {
            Self::Source => &edge.source,
            Self::Target => &edge.target,
        }
    }
}

/// Left anti-join of `edges` against the working set on one endpoint: the
/// edges whose endpoint has no match in the index.
pub fn anti_join<'e, I>(edges: I, set: &WorkingSet, on: Endpoint) -> Vec<&'e Edge>
where
    I: IntoIterator<Item = &'e Edge>,
{
    edges
        .into_iter()
        .filter(|edge| !set.contains(on.of(edge)))
        .collect()
}

/// Left semi-join: the edges whose endpoint matches the index.
pub fn semi_join<'e, I>(edges: I, set: &WorkingSet, on: Endpoint) -> Vec<&'e Edge>
where
    I: IntoIterator<Item = &'e Edge>,
{
    edges
        .into_iter()
        .filter(|edge| set.contains(on.of(edge)))
        .collect()
}

/// Bucket sizes, for logging and run reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub edges: usize,
    pub internal: usize,
    pub candidates_out: usize,
    pub outgoing: usize,
    pub incoming: usize,
    pub discarded: usize,
    pub external_works: usize,
}

/// The four disjoint buckets plus the thresholded outgoing view.
///
/// Every bucket is sorted and free of duplicates.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub internal: Vec<Edge>,
    pub candidates_out: Vec<Edge>,
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
    pub discarded: Vec<Edge>,
    pub support_threshold: usize,
}

impl Partition {
    /// Partition an edge relation by working-set membership of its endpoints.
    pub fn compute<I>(set: &WorkingSet, edges: I, support_threshold: usize) -> Self
    where
        I: IntoIterator<Item = Edge>,
    {
        let unique: Vec<Edge> = edges.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

        let from_set = semi_join(&unique, set, Endpoint::Source);
        let from_outside = anti_join(&unique, set, Endpoint::Source);

        let internal = owned(semi_join(from_set.iter().copied(), set, Endpoint::Target));
        let candidates_out = owned(anti_join(from_set.iter().copied(), set, Endpoint::Target));
        let incoming = owned(semi_join(from_outside.iter().copied(), set, Endpoint::Target));
        let discarded = owned(anti_join(from_outside.iter().copied(), set, Endpoint::Target));

        let outgoing = filter_by_support(&candidates_out, support_threshold);

        let partition = Self {
            internal,
            candidates_out,
            outgoing,
            incoming,
            discarded,
            support_threshold,
        };
        let stats = partition.stats();
        info!(
            edges = stats.edges,
            internal = stats.internal,
            outgoing = stats.outgoing,
            incoming = stats.incoming,
            discarded = stats.discarded,
            k = support_threshold,
            "Citation partition computed"
        );
        partition
    }

    /// External works that citation edges pull into the graph: targets of
    /// `outgoing` and sources of `incoming`.
    pub fn external_work_ids(&self) -> Vec<String> {
        self.outgoing
            .iter()
            .map(|e| e.target.clone())
            .chain(self.incoming.iter().map(|e| e.source.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> PartitionStats {
        PartitionStats {
            edges: self.internal.len()
                + self.candidates_out.len()
                + self.incoming.len()
                + self.discarded.len(),
            internal: self.internal.len(),
            candidates_out: self.candidates_out.len(),
            outgoing: self.outgoing.len(),
            incoming: self.incoming.len(),
            discarded: self.discarded.len(),
            external_works: self.external_work_ids().len(),
        }
    }
}

fn owned(edges: Vec<&Edge>) -> Vec<Edge> {
    edges.into_iter().cloned().collect()
}

/// Two-pass support filter over deduplicated candidate edges.
///
/// Pass 1 counts citing works per external target; pass 2 keeps the edges
/// whose target reaches `k`.
fn filter_by_support(candidates: &[Edge], k: usize) -> Vec<Edge> {
    let mut support: HashMap<&str, usize> = HashMap::new();
    for edge in candidates {
        *support.entry(edge.target.as_str()).or_default() += 1;
    }

    let kept: Vec<Edge> = candidates
        .iter()
        .filter(|edge| support.get(edge.target.as_str()).copied().unwrap_or(0) >= k)
        .cloned()
        .collect();

    debug!(
        targets = support.len(),
        kept_targets = support.values().filter(|n| **n >= k).count(),
        "Outgoing support filter applied"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> WorkingSet {
        WorkingSet::from_ids(ids.iter().map(|s| s.to_string()))
    }

    fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
        pairs.iter().map(|(a, b)| Edge::new(*a, *b)).collect()
    }

    fn scenario() -> (WorkingSet, Vec<Edge>) {
        (
            set(&["W1", "W2", "W3", "W4", "W5"]),
            edges(&[
                ("W1", "W6"),
                ("W1", "W6"),
                ("W2", "W6"),
                ("W3", "W6"),
                ("W4", "W9"),
                ("W1", "W2"),
            ]),
        )
    }

    /// Membership by linear scan, the negated-subquery formulation.
    fn naive_not_in(members: &[String], edges: &[Edge], on: Endpoint) -> BTreeSet<Edge> {
        edges
            .iter()
            .filter(|e| !members.iter().any(|m| m == on.of(e)))
            .cloned()
            .collect()
    }

    #[test]
    fn test_scenario_buckets() {
        let (ws, relation) = scenario();
        let p = Partition::compute(&ws, relation, 3);

        assert_eq!(p.internal, edges(&[("W1", "W2")]));
        assert_eq!(
            p.candidates_out,
            edges(&[("W1", "W6"), ("W2", "W6"), ("W3", "W6"), ("W4", "W9")])
        );
        assert_eq!(p.outgoing, edges(&[("W1", "W6"), ("W2", "W6"), ("W3", "W6")]));
        assert!(p.incoming.is_empty());
        assert!(p.discarded.is_empty());
        assert_eq!(p.external_work_ids(), vec!["W6".to_string()]);
    }

    #[test]
    fn test_buckets_are_disjoint_and_exhaustive() {
        let ws = set(&["A", "B", "C"]);
        let relation = edges(&[
            ("A", "B"),
            ("A", "X"),
            ("X", "A"),
            ("X", "Y"),
            ("B", "A"),
            ("Y", "C"),
            ("X", "Y"),
            ("C", "Z"),
        ]);
        let distinct: BTreeSet<Edge> = relation.iter().cloned().collect();
        let p = Partition::compute(&ws, relation, 1);

        let mut seen = BTreeSet::new();
        for edge in p
            .internal
            .iter()
            .chain(&p.candidates_out)
            .chain(&p.incoming)
            .chain(&p.discarded)
        {
            assert!(seen.insert(edge.clone()), "edge {:?} in two buckets", edge);
        }
        assert_eq!(seen, distinct);
        assert_eq!(p.stats().edges, distinct.len());
        assert_eq!(p.incoming, edges(&[("X", "A"), ("Y", "C")]));
        assert_eq!(p.discarded, edges(&[("X", "Y")]));
    }

    #[test]
    fn test_anti_join_matches_naive_membership() {
        let ws = set(&["W1", "W2", "W3", "W4", "W5"]);
        let relation = edges(&[
            ("W1", "W6"),
            ("W7", "W2"),
            ("W8", "W9"),
            ("W3", "W4"),
            ("W5", "W10"),
            ("W11", "W5"),
        ]);

        for on in [Endpoint::Source, Endpoint::Target] {
            let joined: BTreeSet<Edge> = anti_join(&relation, &ws, on).into_iter().cloned().collect();
            assert_eq!(joined, naive_not_in(ws.ids(), &relation, on));
        }
    }

    #[test]
    fn test_threshold_is_monotonic() {
        let ws = set(&["S1", "S2", "S3", "S4"]);
        let relation = edges(&[
            ("S1", "X"),
            ("S2", "X"),
            ("S3", "X"),
            ("S4", "X"),
            ("S1", "Y"),
            ("S2", "Y"),
            ("S1", "Z"),
        ]);

        let mut previous = usize::MAX;
        for k in 1..=6 {
            let size = Partition::compute(&ws, relation.clone(), k).outgoing.len();
            assert!(size <= previous, "k={} grew outgoing to {}", k, size);
            previous = size;
        }
        assert_eq!(Partition::compute(&ws, relation.clone(), 1).outgoing.len(), 7);
        assert_eq!(Partition::compute(&ws, relation.clone(), 2).outgoing.len(), 6);
        assert_eq!(Partition::compute(&ws, relation, 5).outgoing.len(), 0);
    }

    #[test]
    fn test_duplicate_rows_count_once_toward_support() {
        let ws = set(&["W1", "W2"]);
        let relation = edges(&[("W1", "X"), ("W1", "X"), ("W1", "X"), ("W2", "X")]);
        let p = Partition::compute(&ws, relation, 3);
        assert!(p.outgoing.is_empty());
        assert_eq!(p.candidates_out.len(), 2);
    }

    #[test]
    fn test_empty_working_set() {
        let p = Partition::compute(&WorkingSet::default(), edges(&[("A", "B")]), 3);
        assert!(p.internal.is_empty());
        assert!(p.outgoing.is_empty());
        assert!(p.incoming.is_empty());
        assert_eq!(p.discarded.len(), 1);
    }
}
