//! The relational source seam.

use std::path::Path;

use citegraph_core::ScopeConfig;

use crate::pool::{SourcePool, SourceResult};
use crate::queries::entities::{AuthorRow, InstitutionRow, SourceRow, TopicRow, WorkRow};
use crate::queries::links::{
    AuthorshipRow, PrimaryLocationRow, ReferenceRow, RelatedRow, WorkTopicRow,
};
use crate::queries::{entities, links, scope};

/// Parameterized read access to the relational dataset.
///
/// Id-list methods return rows for the given ids only; ids with no row are
/// skipped.
pub trait RelationalSource: Send + Sync {
    /// Raw rows of the scope predicate; may contain duplicates.
    fn scoped_work_ids(&self, scope: &ScopeConfig) -> SourceResult<Vec<String>>;

    fn works(&self, ids: &[String]) -> SourceResult<Vec<WorkRow>>;
    fn authors(&self, ids: &[String]) -> SourceResult<Vec<AuthorRow>>;
    fn institutions(&self, ids: &[String]) -> SourceResult<Vec<InstitutionRow>>;
    fn topics(&self, ids: &[String]) -> SourceResult<Vec<TopicRow>>;
    fn sources(&self, ids: &[String]) -> SourceResult<Vec<SourceRow>>;

    fn authorships(&self, work_ids: &[String]) -> SourceResult<Vec<AuthorshipRow>>;
    fn work_topics(&self, work_ids: &[String]) -> SourceResult<Vec<WorkTopicRow>>;
    fn primary_locations(&self, work_ids: &[String]) -> SourceResult<Vec<PrimaryLocationRow>>;
    fn related_works(&self, work_ids: &[String]) -> SourceResult<Vec<RelatedRow>>;

    /// Citations made by the given works.
    fn references_from(&self, work_ids: &[String]) -> SourceResult<Vec<ReferenceRow>>;
    /// Citations received by the given works.
    fn references_to(&self, work_ids: &[String]) -> SourceResult<Vec<ReferenceRow>>;
}

/// [`RelationalSource`] over a SQLite OpenAlex mirror.
pub struct SqliteSource {
    pool: SourcePool,
}

impl SqliteSource {
    pub fn new(pool: SourcePool) -> Self {
        Self { pool }
    }

    /// Open a mirror file read-only.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        Ok(Self::new(SourcePool::open(path)?))
    }

    pub fn pool(&self) -> &SourcePool {
        &self.pool
    }
}

impl RelationalSource for SqliteSource {
    fn scoped_work_ids(&self, scope: &ScopeConfig) -> SourceResult<Vec<String>> {
        scope::scoped_work_ids(&self.pool, scope)
    }

    fn works(&self, ids: &[String]) -> SourceResult<Vec<WorkRow>> {
        entities::works(&self.pool, ids)
    }

    fn authors(&self, ids: &[String]) -> SourceResult<Vec<AuthorRow>> {
        entities::authors(&self.pool, ids)
    }

    fn institutions(&self, ids: &[String]) -> SourceResult<Vec<InstitutionRow>> {
        entities::institutions(&self.pool, ids)
    }

    fn topics(&self, ids: &[String]) -> SourceResult<Vec<TopicRow>> {
        entities::topics(&self.pool, ids)
    }

    fn sources(&self, ids: &[String]) -> SourceResult<Vec<SourceRow>> {
        entities::sources(&self.pool, ids)
    }

    fn authorships(&self, work_ids: &[String]) -> SourceResult<Vec<AuthorshipRow>> {
        links::authorships(&self.pool, work_ids)
    }

    fn work_topics(&self, work_ids: &[String]) -> SourceResult<Vec<WorkTopicRow>> {
        links::work_topics(&self.pool, work_ids)
    }

    fn primary_locations(&self, work_ids: &[String]) -> SourceResult<Vec<PrimaryLocationRow>> {
        links::primary_locations(&self.pool, work_ids)
    }

    fn related_works(&self, work_ids: &[String]) -> SourceResult<Vec<RelatedRow>> {
        links::related_works(&self.pool, work_ids)
    }

    fn references_from(&self, work_ids: &[String]) -> SourceResult<Vec<ReferenceRow>> {
        links::references_from(&self.pool, work_ids)
    }

    fn references_to(&self, work_ids: &[String]) -> SourceResult<Vec<ReferenceRow>> {
        links::references_to(&self.pool, work_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::pool::SourceError;
    use crate::queries::ID_CHUNK;
    use rusqlite::params;

    fn source() -> SqliteSource {
        SqliteSource::new(fixture::seeded_pool().unwrap())
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_scoped_ids_keep_predicate_duplicates() {
        let rows = source().scoped_work_ids(&fixture::scope()).unwrap();
        // W1 carries two topics of the subfield.
        assert_eq!(rows.iter().filter(|id| *id == "W1").count(), 2);
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_works_skip_unknown_ids() {
        let rows = source().works(&ids(&["W2", "W1", "nope"])).unwrap();
        let found: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(found, vec!["W1", "W2"]);
        assert_eq!(rows[0].publication_year, Some(2024));
        assert_eq!(rows[0].is_retracted, Some(false));
    }

    #[test]
    fn test_empty_id_list_runs_no_query() {
        assert!(source().authors(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_authorships_carry_publication_year() {
        let rows = source().authorships(&ids(&["W1"])).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.publication_year == Some(2024)));
        assert_eq!(rows[0].institution_id.as_deref(), Some("I1"));
    }

    #[test]
    fn test_references_in_both_directions() {
        let src = source();
        let from = src.references_from(&ids(&["W1"])).unwrap();
        assert_eq!(from.len(), 3);
        let to = src.references_to(&ids(&["W6"])).unwrap();
        assert_eq!(to.len(), 5);
    }

    #[test]
    fn test_id_lists_are_chunked() {
        let mut many: Vec<String> = (0..ID_CHUNK * 2 + 7).map(|i| format!("X{}", i)).collect();
        many.push("W3".to_string());
        let rows = source().works(&many).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "W3");
    }

    #[test]
    fn test_bad_column_type_is_a_data_shape_error() {
        let src = source();
        src.pool()
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE works SET cited_by_count = ?1 WHERE id = ?2",
                    params!["lots", "W2"],
                )?;
                Ok(())
            })
            .unwrap();

        let err = src.works(&ids(&["W1", "W2", "W3"])).unwrap_err();
        match err {
            SourceError::DataShape { query, row, .. } => {
                assert_eq!(query, "works");
                assert_eq!(row, 1);
            }
            other => panic!("expected data shape error, got {other}"),
        }
    }

    #[test]
    fn test_open_on_disk_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.sqlite");
        {
            let pool = SourcePool::create(&path).unwrap();
            fixture::seed(&pool).unwrap();
        }

        let src = SqliteSource::open(&path).unwrap();
        assert_eq!(src.scoped_work_ids(&fixture::scope()).unwrap().len(), 6);
    }
}
