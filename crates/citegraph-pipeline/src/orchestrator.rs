//! The tiered stage runner.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use citegraph_core::{RunConfig, ScopeConfig};
use citegraph_graph::{
    verify, BatchLoader, CancelFlag, GraphStore, LoadError, LoadSettings, VerificationReport,
};
use citegraph_source::{PartitionStats, RelationalSource};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::RunContext;
use crate::error::{PipelineError, PipelineResult};
use crate::stage::{StageId, StageReport, StageState, Tier};
use crate::stages;

/// Which stages a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSelection {
    All,
    /// This stage and every later one. Earlier node stages are taken as
    /// completed by a previous run.
    From(StageId),
    /// Exactly these stages, in canonical order.
    Only(Vec<StageId>),
}

impl StageSelection {
    fn stages(&self) -> Vec<StageId> {
        match self {
            Self::All => StageId::ALL.to_vec(),
            Self::From(first) => StageId::ALL.into_iter().filter(|s| s >= first).collect(),
            Self::Only(list) => StageId::ALL
                .into_iter()
                .filter(|s| list.contains(s))
                .collect(),
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub scope: ScopeConfig,
    pub working_set: usize,
    pub partition: PartitionStats,
    pub stages: Vec<StageReport>,
    pub verification: Option<VerificationReport>,
}

impl RunReport {
    fn new(scope: ScopeConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            scope,
            working_set: 0,
            partition: PartitionStats::default(),
            stages: Vec::new(),
            verification: None,
        }
    }

    pub fn stage(&self, stage: StageId) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn total_dangling(&self) -> usize {
        self.stages.iter().map(|r| r.dangling).sum()
    }
}

/// How one stage ended. `cancelled` is set only when the loader stopped on
/// the cancel flag, never for a batch failure that raced a cancel.
struct StageOutcome {
    report: StageReport,
    rows: Option<Range<usize>>,
    cancelled: bool,
}

/// Runs stages against a graph store and tracks their states across runs.
pub struct Pipeline {
    source: Arc<dyn RelationalSource>,
    store: Arc<dyn GraphStore>,
    config: Arc<RunConfig>,
    states: BTreeMap<StageId, StageState>,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn RelationalSource>,
        store: Arc<dyn GraphStore>,
        config: RunConfig,
    ) -> Self {
        Self {
            source,
            store,
            config: Arc::new(config),
            states: StageId::ALL.into_iter().map(|s| (s, StageState::Pending)).collect(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self, stage: StageId) -> StageState {
        self.states.get(&stage).copied().unwrap_or_default()
    }

    /// Mark a stage as completed by an earlier invocation.
    pub fn assume_completed(&mut self, stage: StageId) {
        self.states.insert(stage, StageState::Completed);
    }

    fn missing_node_stages(&self, selected: &[StageId]) -> Vec<StageId> {
        StageId::node_stages()
            .filter(|s| !selected.contains(s) && self.state(*s) != StageState::Completed)
            .collect()
    }

    /// Execute the selected stages: node stages, then edge stages, stopping
    /// at the first failure. Committed batches are never rolled back.
    pub async fn run(&mut self, selection: StageSelection) -> PipelineResult<RunReport> {
        self.config.validate()?;

        let selected = selection.stages();
        if let StageSelection::From(first) = &selection {
            for stage in StageId::node_stages().filter(|s| s < first) {
                info!(stage = %stage, "Assuming stage completed by a previous run");
                self.assume_completed(stage);
            }
        }

        if let Some(first_edge) = selected.iter().find(|s| s.tier() == Tier::Edges) {
            let missing = self.missing_node_stages(&selected);
            if !missing.is_empty() {
                return Err(PipelineError::DependencyNotMet {
                    stage: *first_edge,
                    missing,
                });
            }
        }

        let mut report = RunReport::new(self.config.scope.clone());
        info!(run_id = %report.run_id, stages = selected.len(), "Pipeline run started");

        self.store.ensure_schema().await?;

        let source = self.source.clone();
        let config = self.config.clone();
        let context = tokio::task::spawn_blocking(move || RunContext::prepare(source, config))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;
        let context = Arc::new(context);
        report.working_set = context.working_set.len();
        report.partition = context.partition.stats();

        for stage in &selected {
            self.states.insert(*stage, StageState::Pending);
        }

        for stage in selected {
            if stage.tier() == Tier::Edges {
                let missing = self.missing_node_stages(&[]);
                if !missing.is_empty() {
                    return Err(PipelineError::DependencyNotMet { stage, missing });
                }
            }

            let outcome = self.run_stage(stage, &context).await;
            let state = outcome.report.state;
            let committed_batches = outcome.report.batches_committed;
            let reason = outcome.report.error.clone().unwrap_or_default();
            let rows = outcome.rows;
            report.stages.push(outcome.report);

            match state {
                StageState::Completed => {}
                _ if outcome.cancelled => {
                    report.finished_at = Some(Utc::now());
                    return Err(PipelineError::Cancelled {
                        stage,
                        committed_batches,
                        report: Box::new(report),
                    });
                }
                _ => {
                    report.finished_at = Some(Utc::now());
                    return Err(PipelineError::StageFailed {
                        stage,
                        committed_batches,
                        rows,
                        reason,
                        report: Box::new(report),
                    });
                }
            }
        }

        if StageId::ALL.iter().all(|s| self.state(*s) == StageState::Completed) {
            report.verification = Some(verify(self.store.as_ref(), &self.config.scope).await?);
        }

        report.finished_at = Some(Utc::now());
        info!(
            run_id = %report.run_id,
            stages = report.stages.len(),
            dangling = report.total_dangling(),
            "Pipeline run completed"
        );
        Ok(report)
    }

    /// Extract on the blocking pool while loading on this task. The two
    /// meet in a channel bounded to one batch, so a stage holds at most two
    /// batches of instructions. Failures end up in the returned outcome,
    /// together with the failing row range if any.
    async fn run_stage(&mut self, stage: StageId, context: &Arc<RunContext>) -> StageOutcome {
        let mut stage_report = StageReport::new(stage);
        stage_report.state = StageState::Running;
        self.states.insert(stage, StageState::Running);
        info!(stage = %stage, tier = ?stage.tier(), "Stage started");
        let started = Instant::now();

        let settings = LoadSettings::for_stage(&self.config.loader, stage.as_str());
        let (sender, receiver) = mpsc::channel(settings.batch_size);

        let ctx = context.clone();
        let producer = tokio::task::spawn_blocking(move || {
            let mut sender = sender;
            stages::extract(stage, &ctx, &mut sender)
        });

        let loader = BatchLoader::new(self.store.as_ref(), settings).with_cancel(self.cancel.clone());
        let loaded = loader.load(stage.as_str(), receiver).await;
        // The receiver is gone once `load` returns, so a producer still
        // running stops at its next send.
        let extracted = producer.await;

        let load = match loaded {
            Ok(load) => load,
            Err(e) => {
                stage_report.batches_committed = e.committed_batches();
                let cancelled = matches!(e, LoadError::Cancelled { .. });
                let rows = e.rows();
                return self.fail(stage_report, started, e.to_string(), rows, cancelled);
            }
        };
        stage_report.batches_committed = load.batches_committed;
        stage_report.instructions = load.instructions;
        stage_report.applied = load.applied;
        stage_report.dangling = load.dangling;
        stage_report.dangling_sample = load.dangling_sample;
        stage_report.retries = load.retries;

        let stats = match extracted {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => return self.fail(stage_report, started, e.to_string(), None, false),
            Err(e) => {
                let reason = format!("extraction task failed: {}", e);
                return self.fail(stage_report, started, reason, None, false);
            }
        };
        stage_report.rows_read = stats.rows_read;
        stage_report.instructions = stats.instructions;

        if load.dangling > 0 && self.config.loader.fail_on_dangling {
            let reason = format!("{} edges reference missing nodes", load.dangling);
            return self.fail(stage_report, started, reason, None, false);
        }

        stage_report.state = StageState::Completed;
        stage_report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.states.insert(stage, StageState::Completed);
        info!(
            stage = %stage,
            rows = stage_report.rows_read,
            applied = stage_report.applied,
            dangling = stage_report.dangling,
            elapsed_ms = stage_report.elapsed_ms,
            "Stage completed"
        );
        if stage_report.dangling > 0 {
            warn!(stage = %stage, dangling = stage_report.dangling, "Stage left dangling references");
        }
        StageOutcome {
            report: stage_report,
            rows: None,
            cancelled: false,
        }
    }

    fn fail(
        &mut self,
        mut stage_report: StageReport,
        started: Instant,
        reason: String,
        rows: Option<Range<usize>>,
        cancelled: bool,
    ) -> StageOutcome {
        error!(
            stage = %stage_report.stage,
            committed_batches = stage_report.batches_committed,
            cancelled,
            reason = %reason,
            "Stage failed"
        );
        stage_report.state = StageState::Failed;
        stage_report.elapsed_ms = started.elapsed().as_millis() as u64;
        stage_report.error = Some(reason);
        self.states.insert(stage_report.stage, StageState::Failed);
        StageOutcome {
            report: stage_report,
            rows,
            cancelled,
        }
    }
}
