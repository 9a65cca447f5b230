//! The batch loader: drains an instruction channel into fixed-size batches
//! and applies them one at a time with bounded retries.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use citegraph_core::{LoaderConfig, UpsertInstruction};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::GraphError;
use crate::store::GraphStore;

/// Dangling keys kept verbatim in a report.
const DANGLING_SAMPLE: usize = 20;

/// Cooperative stop signal, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-stage loader parameters.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl LoadSettings {
    pub fn for_stage(config: &LoaderConfig, stage: &str) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            timeout: config.timeout_for(stage),
        }
    }

    /// Delay before retry number `retry` (1-based).
    fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self::for_stage(&LoaderConfig::default(), "")
    }
}

/// Counters for one loaded stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub instructions: usize,
    pub batches_committed: usize,
    pub applied: usize,
    pub dangling: usize,
    /// The first few dangling edges, for the run report.
    pub dangling_sample: Vec<String>,
    pub retries: usize,
}

/// Why a stage stopped loading. Batches before the failing one stay committed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Rows {rows:?} rejected after {committed_batches} committed batches: {message}")]
    Rejected {
        rows: Range<usize>,
        committed_batches: usize,
        message: String,
    },

    #[error("Rows {rows:?} still failing after {attempts} attempts ({committed_batches} batches committed): {message}")]
    RetriesExhausted {
        rows: Range<usize>,
        attempts: u32,
        committed_batches: usize,
        message: String,
    },

    #[error("Cancelled after {committed_batches} committed batches")]
    Cancelled { committed_batches: usize },
}

impl LoadError {
    pub fn committed_batches(&self) -> usize {
        match self {
            Self::Rejected { committed_batches, .. }
            | Self::RetriesExhausted { committed_batches, .. }
            | Self::Cancelled { committed_batches } => *committed_batches,
        }
    }

    /// The failing instruction range, if a batch failed.
    pub fn rows(&self) -> Option<Range<usize>> {
        match self {
            Self::Rejected { rows, .. } | Self::RetriesExhausted { rows, .. } => Some(rows.clone()),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Drives a [`GraphStore`] with one outstanding batch at a time.
pub struct BatchLoader<'a> {
    store: &'a dyn GraphStore,
    settings: LoadSettings,
    cancel: CancelFlag,
}

impl<'a> BatchLoader<'a> {
    pub fn new(store: &'a dyn GraphStore, settings: LoadSettings) -> Self {
        Self {
            store,
            settings,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply instructions from `instructions` in order, `batch_size` at a
    /// time, until the sender side closes.
    ///
    /// At most one batch is buffered here; with a channel bounded to
    /// `batch_size` the stage never holds more than two batches in memory.
    /// Row ranges count instructions from the start of the stream.
    pub async fn load(
        &self,
        stage: &str,
        mut instructions: mpsc::Receiver<UpsertInstruction>,
    ) -> Result<LoadReport, LoadError> {
        let batch_size = self.settings.batch_size;
        let mut report = LoadReport::default();
        let mut batch: Vec<UpsertInstruction> = Vec::with_capacity(batch_size);
        let mut offset = 0usize;
        let mut closed = false;

        while !closed {
            batch.clear();
            while batch.len() < batch_size {
                let room = batch_size - batch.len();
                if instructions.recv_many(&mut batch, room).await == 0 {
                    closed = true;
                    break;
                }
            }
            if batch.is_empty() {
                break;
            }

            if self.cancel.is_cancelled() {
                warn!(stage, committed = report.batches_committed, "Load cancelled");
                return Err(LoadError::Cancelled {
                    committed_batches: report.batches_committed,
                });
            }

            let rows = offset..offset + batch.len();
            report.instructions += batch.len();
            self.apply_with_retry(stage, rows, &batch, &mut report).await?;
            offset += batch.len();
        }

        info!(
            stage,
            instructions = report.instructions,
            batches = report.batches_committed,
            applied = report.applied,
            dangling = report.dangling,
            retries = report.retries,
            "Stage loaded"
        );
        Ok(report)
    }

    async fn apply_with_retry(
        &self,
        stage: &str,
        rows: Range<usize>,
        batch: &[UpsertInstruction],
        report: &mut LoadReport,
    ) -> Result<(), LoadError> {
        let mut attempt = 1u32;
        loop {
            let pending = self.store.apply_batch(batch);
            let result = match tokio::time::timeout(self.settings.timeout, pending).await {
                Ok(result) => result,
                Err(_) => Err(GraphError::Timeout(self.settings.timeout)),
            };

            match result {
                Ok(outcome) => {
                    report.batches_committed += 1;
                    report.applied += outcome.applied;
                    if !outcome.dangling.is_empty() {
                        warn!(
                            stage,
                            rows = ?rows,
                            dangling = outcome.dangling.len(),
                            "Edges reference missing nodes"
                        );
                        report.dangling += outcome.dangling.len();
                        let room = DANGLING_SAMPLE.saturating_sub(report.dangling_sample.len());
                        report
                            .dangling_sample
                            .extend(outcome.dangling.iter().take(room).map(|key| key.to_string()));
                    }
                    debug!(stage, rows = ?rows, applied = outcome.applied, attempt, "Batch committed");
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                    let delay = self.settings.backoff_for(attempt);
                    warn!(
                        stage,
                        rows = ?rows,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Transient batch failure, retrying"
                    );
                    report.retries += 1;
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(LoadError::RetriesExhausted {
                        rows,
                        attempts: attempt,
                        committed_batches: report.batches_committed,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(LoadError::Rejected {
                        rows,
                        committed_batches: report.batches_committed,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use citegraph_core::{AttrValue, EdgeKind, EdgeUpsert, NodeKind, NodeUpsert};

    use crate::error::GraphResult;
    use crate::memory::{Fault, MemoryGraph};
    use crate::store::BatchOutcome;

    fn settings(batch_size: usize) -> LoadSettings {
        LoadSettings {
            batch_size,
            max_attempts: 3,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    fn works(n: usize) -> Vec<UpsertInstruction> {
        (0..n)
            .map(|i| {
                NodeUpsert::new(NodeKind::Work, format!("W{}", i))
                    .with("cited_by_count", i as i64)
                    .into()
            })
            .collect()
    }

    /// A closed channel already holding `items`.
    fn stream(items: Vec<UpsertInstruction>) -> mpsc::Receiver<UpsertInstruction> {
        let (sender, receiver) = mpsc::channel(items.len().max(1));
        for item in items {
            sender.try_send(item).unwrap();
        }
        receiver
    }

    /// Counts instructions the producer has handed over against the ones
    /// committed, and records the largest gap seen when a batch arrives.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryGraph,
        produced: Arc<AtomicUsize>,
        committed: AtomicUsize,
        max_outstanding: AtomicUsize,
        max_batch: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for RecordingStore {
        async fn ensure_schema(&self) -> GraphResult<()> {
            self.inner.ensure_schema().await
        }

        async fn apply_batch(&self, batch: &[UpsertInstruction]) -> GraphResult<BatchOutcome> {
            let outstanding = self
                .produced
                .load(Ordering::SeqCst)
                .saturating_sub(self.committed.load(Ordering::SeqCst));
            self.max_outstanding.fetch_max(outstanding, Ordering::SeqCst);
            self.max_batch.fetch_max(batch.len(), Ordering::SeqCst);

            let outcome = self.inner.apply_batch(batch).await?;
            self.committed.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(outcome)
        }

        async fn count_nodes(&self, kind: NodeKind) -> GraphResult<u64> {
            self.inner.count_nodes(kind).await
        }

        async fn count_edges(&self, kind: EdgeKind) -> GraphResult<u64> {
            self.inner.count_edges(kind).await
        }

        async fn count_connected(&self, kind: NodeKind, edge: EdgeKind) -> GraphResult<u64> {
            self.inner.count_connected(kind, edge).await
        }

        async fn count_with_property(
            &self,
            kind: NodeKind,
            property: &str,
            value: Option<&AttrValue>,
        ) -> GraphResult<u64> {
            self.inner.count_with_property(kind, property, value).await
        }
    }

    #[tokio::test]
    async fn test_loader_holds_at_most_a_batch_beyond_the_channel() {
        const B: usize = 8;
        let store = RecordingStore::default();
        let produced = store.produced.clone();

        let (sender, receiver) = mpsc::channel(B);
        let producer = tokio::spawn(async move {
            for instruction in works(5 * B) {
                sender.send(instruction).await.unwrap();
                produced.fetch_add(1, Ordering::SeqCst);
            }
        });

        let report = BatchLoader::new(&store, settings(B))
            .load("works", receiver)
            .await
            .unwrap();
        producer.await.unwrap();

        assert_eq!(report.instructions, 5 * B);
        assert_eq!(report.batches_committed, 5);
        assert_eq!(store.max_batch.load(Ordering::SeqCst), B);
        // One batch in hand plus a full channel.
        assert!(store.max_outstanding.load(Ordering::SeqCst) <= 2 * B);
        assert_eq!(store.inner.node_total(), 5 * B);
    }

    #[tokio::test]
    async fn test_row_ranges_count_across_the_stream() {
        let graph = MemoryGraph::new();
        graph.poison("W7");

        let (sender, receiver) = mpsc::channel(3);
        let producer = tokio::spawn(async move {
            for instruction in works(12) {
                if sender.send(instruction).await.is_err() {
                    break;
                }
            }
        });

        let err = BatchLoader::new(&graph, settings(3))
            .load("works", receiver)
            .await
            .unwrap_err();
        producer.await.unwrap();

        assert_eq!(err.rows(), Some(6..9));
        assert_eq!(err.committed_batches(), 2);
        assert_eq!(graph.node_total(), 6);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_without_duplicates() {
        let graph = MemoryGraph::new();
        graph.inject(Fault::Transient("Neo.TransientError.Transaction.LockClientStopped".to_string()));

        let loader = BatchLoader::new(&graph, settings(1000));
        let report = loader.load("works", stream(works(1000))).await.unwrap();

        assert_eq!(graph.count_nodes(NodeKind::Work).await.unwrap(), 1000);
        assert_eq!(report.batches_committed, 1);
        assert_eq!(report.retries, 1);
        assert_eq!(graph.attempts(), 2);
    }

    #[tokio::test]
    async fn test_rejected_batch_reports_row_range() {
        let graph = MemoryGraph::new();
        graph.poison("W25");

        let loader = BatchLoader::new(&graph, settings(10));
        let err = loader.load("works", stream(works(40))).await.unwrap_err();

        match &err {
            LoadError::Rejected { rows, committed_batches, .. } => {
                assert_eq!(*rows, 20..30);
                assert_eq!(*committed_batches, 2);
            }
            other => panic!("expected rejection, got {other}"),
        }
        // Earlier batches stay, nothing of the failing one leaks.
        assert_eq!(graph.node_total(), 20);
        assert_eq!(graph.attempts(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let graph = MemoryGraph::new();
        for _ in 0..3 {
            graph.inject(Fault::Transient("deadlock".to_string()));
        }

        let loader = BatchLoader::new(&graph, settings(5));
        let err = loader.load("authors", stream(works(5))).await.unwrap_err();

        assert!(matches!(err, LoadError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(err.committed_batches(), 0);
        assert_eq!(graph.node_total(), 0);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let graph = MemoryGraph::new();
        graph.inject(Fault::Stall(Duration::from_millis(200)));

        let mut s = settings(10);
        s.timeout = Duration::from_millis(20);
        let report = BatchLoader::new(&graph, s).load("cited", stream(works(10))).await.unwrap();

        assert_eq!(report.retries, 1);
        assert_eq!(graph.node_total(), 10);
    }

    #[tokio::test]
    async fn test_cancel_between_batches() {
        let graph = MemoryGraph::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = BatchLoader::new(&graph, settings(10))
            .with_cancel(cancel)
            .load("works", stream(works(30)))
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Cancelled { committed_batches: 0 }));
        assert_eq!(graph.attempts(), 0);
    }

    #[tokio::test]
    async fn test_dangling_edges_are_counted() {
        let graph = MemoryGraph::new();
        let loader = BatchLoader::new(&graph, settings(2));
        loader.load("works", stream(works(2))).await.unwrap();

        let edges: Vec<UpsertInstruction> = vec![
            EdgeUpsert::new(EdgeKind::Cited, "W0", "W1").into(),
            EdgeUpsert::new(EdgeKind::Cited, "W0", "W9").into(),
            EdgeUpsert::new(EdgeKind::Cited, "W8", "W1").into(),
        ];
        let report = loader.load("cited", stream(edges)).await.unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.dangling, 2);
        assert_eq!(report.dangling_sample.len(), 2);
        assert_eq!(report.batches_committed, 2);
    }

    #[test]
    fn test_backoff_doubles() {
        let s = LoadSettings {
            backoff: Duration::from_millis(500),
            ..settings(1)
        };
        assert_eq!(s.backoff_for(1), Duration::from_millis(500));
        assert_eq!(s.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(s.backoff_for(3), Duration::from_millis(2000));
    }
}
