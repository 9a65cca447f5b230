//! Per-run shared state.

use std::collections::HashSet;
use std::sync::Arc;

use citegraph_core::RunConfig;
use citegraph_source::{Edge, Partition, RelationalSource, SourceResult, WorkingSet};
use tracing::info;

/// Everything stages read: built once per run, shared read-only.
pub struct RunContext {
    pub source: Arc<dyn RelationalSource>,
    pub config: Arc<RunConfig>,
    pub working_set: Arc<WorkingSet>,
    pub partition: Arc<Partition>,
    external_works: HashSet<String>,
}

impl RunContext {
    /// Materialize the working set and partition the citations touching it.
    ///
    /// Blocking; run on the blocking pool from async code.
    pub fn prepare(source: Arc<dyn RelationalSource>, config: Arc<RunConfig>) -> SourceResult<Self> {
        let working_set = WorkingSet::materialize(source.as_ref(), &config.scope)?;

        let mut references = source.references_from(working_set.ids())?;
        references.extend(source.references_to(working_set.ids())?);
        let partition = Partition::compute(
            &working_set,
            references.into_iter().map(Edge::from),
            config.partition.support_threshold,
        );

        let external_works: HashSet<String> = if config.partition.include_external {
            partition.external_work_ids().into_iter().collect()
        } else {
            HashSet::new()
        };
        info!(
            works = working_set.len(),
            external = external_works.len(),
            "Run context prepared"
        );

        Ok(Self {
            source,
            config,
            working_set: Arc::new(working_set),
            partition: Arc::new(partition),
            external_works,
        })
    }

    /// Works outside the scope that the Work stage still loads.
    pub fn external_works(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.external_works.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether a Work node for `id` is produced by this run.
    pub fn loads_work(&self, id: &str) -> bool {
        self.working_set.contains(id) || self.external_works.contains(id)
    }
}
