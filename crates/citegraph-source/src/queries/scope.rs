//! The working-set predicate.

use citegraph_core::ScopeConfig;
use rusqlite::params;

use crate::pool::{SourceError, SourcePool, SourceResult};

/// Ids of works tagged with a topic of the scope's subfield and published in
/// the scope's year.
///
/// A work tagged with several topics of the subfield is returned once per
/// topic; the working set collapses duplicates.
pub fn scoped_work_ids(pool: &SourcePool, scope: &ScopeConfig) -> SourceResult<Vec<String>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT w.id
             FROM works w
             JOIN works_topics wt ON wt.work_id = w.id
             JOIN topics t ON t.id = wt.topic_id
             WHERE t.subfield_id = ?1 AND w.publication_year = ?2",
        )?;
        let mut rows = stmt.query(params![scope.subfield_id, scope.publication_year])?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row
                .get(0)
                .map_err(|e| SourceError::from_row_error("scoped_work_ids", ids.len(), e))?;
            ids.push(id);
        }
        Ok(ids)
    })
}
