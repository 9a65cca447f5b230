//! The per-run working set of in-scope work ids.

use std::collections::HashSet;

use citegraph_core::ScopeConfig;
use tracing::info;

use crate::pool::SourceResult;
use crate::source::RelationalSource;

/// Ids passing the scope predicate, deduplicated and hash-indexed.
///
/// The sorted arena drives ordered reads; the hash index answers membership.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    ids: Vec<String>,
    index: HashSet<String>,
}

impl WorkingSet {
    /// Build from raw predicate rows. Duplicates collapse.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let index = ids.iter().cloned().collect();

        Self { ids, index }
    }

    /// Run the scope predicate against the source once.
    pub fn materialize(source: &dyn RelationalSource, scope: &ScopeConfig) -> SourceResult<Self> {
        let rows = source.scoped_work_ids(scope)?;
        let raw = rows.len();
        let set = Self::from_ids(rows);
        info!(
            subfield = %scope.subfield_id,
            year = scope.publication_year,
            rows = raw,
            works = set.len(),
            "Working set materialized"
        );
        Ok(set)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Members in ascending id order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
