//! The target graph seam.

use async_trait::async_trait;
use citegraph_core::{AttrValue, EdgeKey, EdgeKind, NodeKind, UpsertInstruction};

use crate::error::GraphResult;

/// What one committed batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Instructions that took effect (node merges plus edge merges).
    pub applied: usize,
    /// Edge instructions skipped because an endpoint node is missing.
    pub dangling: Vec<EdgeKey>,
}

/// An idempotent, batch-transactional graph target.
///
/// `apply_batch` is all-or-nothing: on `Err` none of the batch is visible.
/// Edge instructions never create their endpoints; a missing endpoint is
/// reported in [`BatchOutcome::dangling`].
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create constraints and indexes. Safe to repeat.
    async fn ensure_schema(&self) -> GraphResult<()>;

    async fn apply_batch(&self, batch: &[UpsertInstruction]) -> GraphResult<BatchOutcome>;

    async fn count_nodes(&self, kind: NodeKind) -> GraphResult<u64>;

    async fn count_edges(&self, kind: EdgeKind) -> GraphResult<u64>;

    /// Nodes of `kind` with at least one `edge` relationship in either direction.
    async fn count_connected(&self, kind: NodeKind, edge: EdgeKind) -> GraphResult<u64>;

    /// Nodes of `kind` whose `property` is set, or equals `value` when given.
    async fn count_with_property(
        &self,
        kind: NodeKind,
        property: &str,
        value: Option<&AttrValue>,
    ) -> GraphResult<u64>;
}
