//! In-memory [`GraphStore`] for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use citegraph_core::{
    AttrValue, Attributes, EdgeKey, EdgeKind, EdgeUpsert, MergeRule, NodeKind, NodeUpsert,
    UpsertInstruction,
};
use parking_lot::Mutex;

use crate::error::{GraphError, GraphResult};
use crate::store::{BatchOutcome, GraphStore};

/// A failure to inject into the next `apply_batch` call.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail with a retryable error; nothing is applied.
    Transient(String),
    /// Fail with a non-retryable error; nothing is applied.
    Rejected(String),
    /// Sleep before applying, to trip the loader's timeout.
    Stall(Duration),
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<(NodeKind, String), Attributes>,
    edges: BTreeMap<EdgeKey, Attributes>,
}

/// A graph held in process memory with the same merge semantics as Neo4j.
///
/// Batches are validated before anything is written, so a failing batch
/// leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<GraphState>,
    faults: Mutex<VecDeque<Fault>>,
    poisoned: Mutex<BTreeSet<String>>,
    attempts: AtomicUsize,
    commits: AtomicUsize,
    schema_ready: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fault for the next `apply_batch` call.
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push_back(fault);
    }

    /// Reject every batch that mentions `id` until [`MemoryGraph::heal`].
    pub fn poison(&self, id: impl Into<String>) {
        self.poisoned.lock().insert(id.into());
    }

    pub fn heal(&self, id: &str) {
        self.poisoned.lock().remove(id);
    }

    pub fn node(&self, kind: NodeKind, id: &str) -> Option<Attributes> {
        self.state.lock().nodes.get(&(kind, id.to_string())).cloned()
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<Attributes> {
        self.state.lock().edges.get(key).cloned()
    }

    pub fn node_total(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn edge_total(&self) -> usize {
        self.state.lock().edges.len()
    }

    /// `apply_batch` calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn schema_ready(&self) -> bool {
        self.schema_ready.load(Ordering::SeqCst)
    }

    fn check_poisoned(&self, batch: &[UpsertInstruction]) -> GraphResult<()> {
        let poisoned = self.poisoned.lock();
        if poisoned.is_empty() {
            return Ok(());
        }
        for (row, instruction) in batch.iter().enumerate() {
            let hit = match instruction {
                UpsertInstruction::Node(n) => poisoned.contains(&n.id),
                UpsertInstruction::Edge(e) => {
                    poisoned.contains(&e.source) || poisoned.contains(&e.target)
                }
            };
            if hit {
                return Err(GraphError::Rejected(format!(
                    "cannot map row {} ({}) to the graph schema",
                    row,
                    instruction.describe()
                )));
            }
        }
        Ok(())
    }
}

fn merge_attrs(stored: &mut Attributes, incoming: &Attributes) {
    for (name, value) in incoming {
        if value.is_null() {
            stored.remove(name);
        } else {
            stored.insert(name.clone(), value.clone());
        }
    }
}

impl GraphState {
    fn upsert_node(&mut self, node: &NodeUpsert) {
        let stored = self.nodes.entry((node.kind, node.id.clone())).or_default();
        merge_attrs(stored, &node.attrs);
    }

    /// Returns `false` when an endpoint is missing.
    fn upsert_edge(&mut self, edge: &EdgeUpsert) -> bool {
        let (from, to) = edge.kind.endpoints();
        if !self.nodes.contains_key(&(from, edge.source.clone()))
            || !self.nodes.contains_key(&(to, edge.target.clone()))
        {
            return false;
        }

        let key = edge.key();
        let created = !self.edges.contains_key(&key);
        let stored = self.edges.entry(key).or_default();

        if edge.kind.merge_rule() == MergeRule::SeenRange {
            if let Some(seen) = edge.seen {
                if created || !stored.contains_key("first_seen") {
                    stored.insert("first_seen".to_string(), AttrValue::Int(seen));
                }
                let last = stored.get("last_seen").and_then(AttrValue::as_i64);
                if last.map_or(true, |last| seen > last) {
                    stored.insert("last_seen".to_string(), AttrValue::Int(seen));
                }
            }
        }
        merge_attrs(stored, &edge.attrs);
        true
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ensure_schema(&self) -> GraphResult<()> {
        self.schema_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_batch(&self, batch: &[UpsertInstruction]) -> GraphResult<BatchOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let fault = self.faults.lock().pop_front();
        match fault {
            Some(Fault::Transient(message)) => return Err(GraphError::Transient(message)),
            Some(Fault::Rejected(message)) => return Err(GraphError::Rejected(message)),
            Some(Fault::Stall(delay)) => tokio::time::sleep(delay).await,
            None => {}
        }

        self.check_poisoned(batch)?;

        let mut state = self.state.lock();
        let mut outcome = BatchOutcome::default();

        // Nodes first so edges in the same batch can see them.
        for instruction in batch {
            if let UpsertInstruction::Node(node) = instruction {
                state.upsert_node(node);
                outcome.applied += 1;
            }
        }
        for instruction in batch {
            if let UpsertInstruction::Edge(edge) = instruction {
                if state.upsert_edge(edge) {
                    outcome.applied += 1;
                } else {
                    outcome.dangling.push(edge.key());
                }
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn count_nodes(&self, kind: NodeKind) -> GraphResult<u64> {
        let state = self.state.lock();
        Ok(state.nodes.keys().filter(|(k, _)| *k == kind).count() as u64)
    }

    async fn count_edges(&self, kind: EdgeKind) -> GraphResult<u64> {
        let state = self.state.lock();
        Ok(state.edges.keys().filter(|key| key.kind == kind).count() as u64)
    }

    async fn count_connected(&self, kind: NodeKind, edge: EdgeKind) -> GraphResult<u64> {
        let state = self.state.lock();
        let (from, to) = edge.endpoints();

        let mut touched: BTreeSet<&str> = BTreeSet::new();
        for key in state.edges.keys().filter(|key| key.kind == edge) {
            if from == kind {
                touched.insert(key.source.as_str());
            }
            if to == kind {
                touched.insert(key.target.as_str());
            }
        }

        Ok(touched
            .into_iter()
            .filter(|id| state.nodes.contains_key(&(kind, id.to_string())))
            .count() as u64)
    }

    async fn count_with_property(
        &self,
        kind: NodeKind,
        property: &str,
        value: Option<&AttrValue>,
    ) -> GraphResult<u64> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .filter_map(|(_, attrs)| attrs.get(property))
            .filter(|stored| match value {
                Some(expected) => *stored == expected,
                None => !stored.is_null(),
            })
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(id: &str) -> UpsertInstruction {
        NodeUpsert::new(NodeKind::Work, id).into()
    }

    fn topic(id: &str) -> UpsertInstruction {
        NodeUpsert::new(NodeKind::Topic, id).into()
    }

    #[tokio::test]
    async fn test_repeated_edge_updates_in_place() {
        let graph = MemoryGraph::new();
        graph.apply_batch(&[work("W1"), topic("T1")]).await.unwrap();

        let first = EdgeUpsert::new(EdgeKind::TaggedWith, "W1", "T1").with("score", 0.5);
        let second = EdgeUpsert::new(EdgeKind::TaggedWith, "W1", "T1").with("score", 0.8);
        graph.apply_batch(&[first.into()]).await.unwrap();
        graph.apply_batch(&[second.into()]).await.unwrap();

        assert_eq!(graph.count_edges(EdgeKind::TaggedWith).await.unwrap(), 1);
        let stored = graph
            .edge(&EdgeKey::new(EdgeKind::TaggedWith, "W1", "T1"))
            .unwrap();
        assert_eq!(stored.get("score"), Some(&AttrValue::Float(0.8)));
    }

    #[tokio::test]
    async fn test_seen_range_merge() {
        let graph = MemoryGraph::new();
        graph
            .apply_batch(&[
                NodeUpsert::new(NodeKind::Author, "A1").into(),
                NodeUpsert::new(NodeKind::Institution, "I1").into(),
            ])
            .await
            .unwrap();

        for year in [2021, 2023, 2019] {
            let edge = EdgeUpsert::new(EdgeKind::AffiliatedWith, "A1", "I1").seen(Some(year));
            graph.apply_batch(&[edge.into()]).await.unwrap();
        }

        let stored = graph
            .edge(&EdgeKey::new(EdgeKind::AffiliatedWith, "A1", "I1"))
            .unwrap();
        assert_eq!(stored.get("first_seen"), Some(&AttrValue::Int(2021)));
        assert_eq!(stored.get("last_seen"), Some(&AttrValue::Int(2023)));
    }

    #[tokio::test]
    async fn test_seen_range_fills_in_after_unknown_year() {
        let graph = MemoryGraph::new();
        graph
            .apply_batch(&[
                NodeUpsert::new(NodeKind::Author, "A1").into(),
                NodeUpsert::new(NodeKind::Institution, "I1").into(),
            ])
            .await
            .unwrap();
        let key = EdgeKey::new(EdgeKind::AffiliatedWith, "A1", "I1");

        let unknown = EdgeUpsert::new(EdgeKind::AffiliatedWith, "A1", "I1").seen(None);
        graph.apply_batch(&[unknown.into()]).await.unwrap();
        let stored = graph.edge(&key).unwrap();
        assert!(stored.get("first_seen").is_none());
        assert!(stored.get("last_seen").is_none());

        let dated = EdgeUpsert::new(EdgeKind::AffiliatedWith, "A1", "I1").seen(Some(2022));
        graph.apply_batch(&[dated.into()]).await.unwrap();
        let stored = graph.edge(&key).unwrap();
        assert_eq!(stored.get("first_seen"), Some(&AttrValue::Int(2022)));
        assert_eq!(stored.get("last_seen"), Some(&AttrValue::Int(2022)));
        assert_eq!(graph.count_edges(EdgeKind::AffiliatedWith).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_with_property() {
        let graph = MemoryGraph::new();
        graph
            .apply_batch(&[
                NodeUpsert::new(NodeKind::Source, "S1").with("is_oa", true).into(),
                NodeUpsert::new(NodeKind::Source, "S2").with("is_oa", false).into(),
                NodeUpsert::new(NodeKind::Source, "S3").into(),
                NodeUpsert::new(NodeKind::Work, "W1").with("is_oa", true).into(),
            ])
            .await
            .unwrap();

        let set = graph.count_with_property(NodeKind::Source, "is_oa", None).await.unwrap();
        let open = graph
            .count_with_property(NodeKind::Source, "is_oa", Some(&AttrValue::Bool(true)))
            .await
            .unwrap();
        assert_eq!(set, 2);
        assert_eq!(open, 1);
    }

    #[tokio::test]
    async fn test_null_removes_property() {
        let graph = MemoryGraph::new();
        let with_doi = NodeUpsert::new(NodeKind::Work, "W1").with("doi", "10.1/x");
        let without = NodeUpsert::new(NodeKind::Work, "W1").with("doi", AttrValue::Null);
        graph.apply_batch(&[with_doi.into()]).await.unwrap();
        graph.apply_batch(&[without.into()]).await.unwrap();

        assert!(graph.node(NodeKind::Work, "W1").unwrap().get("doi").is_none());
        assert_eq!(graph.node_total(), 1);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_dangling_not_created() {
        let graph = MemoryGraph::new();
        graph.apply_batch(&[work("W1")]).await.unwrap();

        let outcome = graph
            .apply_batch(&[EdgeUpsert::new(EdgeKind::Cited, "W1", "W404").into()])
            .await
            .unwrap();

        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.dangling, vec![EdgeKey::new(EdgeKind::Cited, "W1", "W404")]);
        assert_eq!(graph.node_total(), 1);
        assert_eq!(graph.edge_total(), 0);
    }

    #[tokio::test]
    async fn test_symmetric_edges_collapse() {
        let graph = MemoryGraph::new();
        graph.apply_batch(&[work("W1"), work("W2")]).await.unwrap();
        graph
            .apply_batch(&[
                EdgeUpsert::new(EdgeKind::RelatedTo, "W2", "W1").into(),
                EdgeUpsert::new(EdgeKind::RelatedTo, "W1", "W2").into(),
            ])
            .await
            .unwrap();

        assert_eq!(graph.count_edges(EdgeKind::RelatedTo).await.unwrap(), 1);
        assert_eq!(
            graph
                .count_connected(NodeKind::Work, EdgeKind::RelatedTo)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_faulted_batch_applies_nothing() {
        let graph = MemoryGraph::new();
        graph.inject(Fault::Transient("lock wait".to_string()));
        graph.poison("W3");

        let err = graph.apply_batch(&[work("W1")]).await.unwrap_err();
        assert!(err.is_transient());

        let err = graph
            .apply_batch(&[work("W1"), work("W2"), work("W3")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("row 2"));
        assert_eq!(graph.node_total(), 0);
        assert_eq!(graph.attempts(), 2);
        assert_eq!(graph.commits(), 0);
    }
}
