//! Relationship-side queries, keyed by work id.

use super::query_by_ids;
use crate::pool::{SourcePool, SourceResult};

/// One authorship of a work, joined with the work's publication year.
#[derive(Debug, Clone)]
pub struct AuthorshipRow {
    pub work_id: String,
    pub author_id: String,
    pub author_position: Option<String>,
    pub institution_id: Option<String>,
    pub publication_year: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct WorkTopicRow {
    pub work_id: String,
    pub topic_id: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PrimaryLocationRow {
    pub work_id: String,
    pub source_id: String,
    pub is_oa: Option<bool>,
    pub version: Option<String>,
}

/// A directed citation: `citing` references `cited`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub citing: String,
    pub cited: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedRow {
    pub work_id: String,
    pub related_work_id: String,
}

/// Authorships of the given works that name an author.
pub fn authorships(pool: &SourcePool, work_ids: &[String]) -> SourceResult<Vec<AuthorshipRow>> {
    query_by_ids(
        pool,
        "authorships",
        "SELECT a.work_id, a.author_id, a.author_position, a.institution_id, w.publication_year
         FROM works_authorships a
         LEFT JOIN works w ON w.id = a.work_id
         WHERE a.work_id IN ({ids}) AND a.author_id IS NOT NULL
         ORDER BY a.work_id, a.author_id",
        work_ids,
        |row| {
            Ok(AuthorshipRow {
                work_id: row.get(0)?,
                author_id: row.get(1)?,
                author_position: row.get(2)?,
                institution_id: row.get(3)?,
                publication_year: row.get(4)?,
            })
        },
    )
}

pub fn work_topics(pool: &SourcePool, work_ids: &[String]) -> SourceResult<Vec<WorkTopicRow>> {
    query_by_ids(
        pool,
        "work_topics",
        "SELECT work_id, topic_id, score
         FROM works_topics
         WHERE work_id IN ({ids})
         ORDER BY work_id, topic_id",
        work_ids,
        |row| {
            Ok(WorkTopicRow {
                work_id: row.get(0)?,
                topic_id: row.get(1)?,
                score: row.get(2)?,
            })
        },
    )
}

pub fn primary_locations(
    pool: &SourcePool,
    work_ids: &[String],
) -> SourceResult<Vec<PrimaryLocationRow>> {
    query_by_ids(
        pool,
        "primary_locations",
        "SELECT work_id, source_id, is_oa, version
         FROM works_primary_locations
         WHERE work_id IN ({ids}) AND source_id IS NOT NULL
         ORDER BY work_id, source_id",
        work_ids,
        |row| {
            Ok(PrimaryLocationRow {
                work_id: row.get(0)?,
                source_id: row.get(1)?,
                is_oa: row.get(2)?,
                version: row.get(3)?,
            })
        },
    )
}

/// Citations whose citing work is one of `work_ids`.
pub fn references_from(pool: &SourcePool, work_ids: &[String]) -> SourceResult<Vec<ReferenceRow>> {
    query_by_ids(
        pool,
        "references_from",
        "SELECT work_id, referenced_work_id
         FROM works_referenced_works
         WHERE work_id IN ({ids})",
        work_ids,
        map_reference,
    )
}

/// Citations whose cited work is one of `work_ids`.
pub fn references_to(pool: &SourcePool, work_ids: &[String]) -> SourceResult<Vec<ReferenceRow>> {
    query_by_ids(
        pool,
        "references_to",
        "SELECT work_id, referenced_work_id
         FROM works_referenced_works
         WHERE referenced_work_id IN ({ids})",
        work_ids,
        map_reference,
    )
}

fn map_reference(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReferenceRow> {
    Ok(ReferenceRow {
        citing: row.get(0)?,
        cited: row.get(1)?,
    })
}

pub fn related_works(pool: &SourcePool, work_ids: &[String]) -> SourceResult<Vec<RelatedRow>> {
    query_by_ids(
        pool,
        "related_works",
        "SELECT work_id, related_work_id
         FROM works_related_works
         WHERE work_id IN ({ids})
         ORDER BY work_id, related_work_id",
        work_ids,
        |row| {
            Ok(RelatedRow {
                work_id: row.get(0)?,
                related_work_id: row.get(1)?,
            })
        },
    )
}
