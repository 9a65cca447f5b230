//! Node-side queries: one row per entity id.

use super::query_by_ids;
use crate::pool::{SourcePool, SourceResult};

/// Work row from the mirror.
#[derive(Debug, Clone)]
pub struct WorkRow {
    pub id: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i64>,
    pub publication_date: Option<String>,
    pub work_type: Option<String>,
    pub cited_by_count: Option<i64>,
    pub is_retracted: Option<bool>,
    pub is_paratext: Option<bool>,
    pub language: Option<String>,
}

/// Author row from the mirror.
#[derive(Debug, Clone)]
pub struct AuthorRow {
    pub id: String,
    pub orcid: Option<String>,
    pub display_name: Option<String>,
    pub display_name_alternatives: Option<String>,
    pub works_count: Option<i64>,
    pub cited_by_count: Option<i64>,
}

/// Institution row from the mirror.
#[derive(Debug, Clone)]
pub struct InstitutionRow {
    pub id: String,
    pub ror: Option<String>,
    pub display_name: Option<String>,
    pub country_code: Option<String>,
    pub institution_type: Option<String>,
    pub homepage_url: Option<String>,
    pub works_count: Option<i64>,
    pub cited_by_count: Option<i64>,
}

/// Topic row from the mirror.
#[derive(Debug, Clone)]
pub struct TopicRow {
    pub id: String,
    pub display_name: Option<String>,
    pub subfield_id: Option<String>,
    pub subfield_display_name: Option<String>,
    pub field_id: Option<String>,
    pub field_display_name: Option<String>,
    pub domain_id: Option<String>,
    pub domain_display_name: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub works_count: Option<i64>,
    pub cited_by_count: Option<i64>,
}

/// Source (venue) row from the mirror.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub id: String,
    pub issn_l: Option<String>,
    pub issn: Option<String>,
    pub display_name: Option<String>,
    pub publisher: Option<String>,
    pub works_count: Option<i64>,
    pub cited_by_count: Option<i64>,
    pub is_oa: Option<bool>,
    pub is_in_doaj: Option<bool>,
    pub homepage_url: Option<String>,
}

/// Fetch works by id, ordered by id.
pub fn works(pool: &SourcePool, ids: &[String]) -> SourceResult<Vec<WorkRow>> {
    query_by_ids(
        pool,
        "works",
        "SELECT id, doi, title, display_name, publication_year, publication_date,
                type, cited_by_count, is_retracted, is_paratext, language
         FROM works WHERE id IN ({ids}) ORDER BY id",
        ids,
        |row| {
            Ok(WorkRow {
                id: row.get(0)?,
                doi: row.get(1)?,
                title: row.get(2)?,
                display_name: row.get(3)?,
                publication_year: row.get(4)?,
                publication_date: row.get(5)?,
                work_type: row.get(6)?,
                cited_by_count: row.get(7)?,
                is_retracted: row.get(8)?,
                is_paratext: row.get(9)?,
                language: row.get(10)?,
            })
        },
    )
}

/// Fetch authors by id, ordered by id.
pub fn authors(pool: &SourcePool, ids: &[String]) -> SourceResult<Vec<AuthorRow>> {
    query_by_ids(
        pool,
        "authors",
        "SELECT id, orcid, display_name, display_name_alternatives, works_count, cited_by_count
         FROM authors WHERE id IN ({ids}) ORDER BY id",
        ids,
        |row| {
            Ok(AuthorRow {
                id: row.get(0)?,
                orcid: row.get(1)?,
                display_name: row.get(2)?,
                display_name_alternatives: row.get(3)?,
                works_count: row.get(4)?,
                cited_by_count: row.get(5)?,
            })
        },
    )
}

pub fn institutions(pool: &SourcePool, ids: &[String]) -> SourceResult<Vec<InstitutionRow>> {
    query_by_ids(
        pool,
        "institutions",
        "SELECT id, ror, display_name, country_code, type, homepage_url,
                works_count, cited_by_count
         FROM institutions WHERE id IN ({ids}) ORDER BY id",
        ids,
        |row| {
            Ok(InstitutionRow {
                id: row.get(0)?,
                ror: row.get(1)?,
                display_name: row.get(2)?,
                country_code: row.get(3)?,
                institution_type: row.get(4)?,
                homepage_url: row.get(5)?,
                works_count: row.get(6)?,
                cited_by_count: row.get(7)?,
            })
        },
    )
}

pub fn topics(pool: &SourcePool, ids: &[String]) -> SourceResult<Vec<TopicRow>> {
    query_by_ids(
        pool,
        "topics",
        "SELECT id, display_name, subfield_id, subfield_display_name, field_id,
                field_display_name, domain_id, domain_display_name, description,
                keywords, works_count, cited_by_count
         FROM topics WHERE id IN ({ids}) ORDER BY id",
        ids,
        |row| {
            Ok(TopicRow {
                id: row.get(0)?,
                display_name: row.get(1)?,
                subfield_id: row.get(2)?,
                subfield_display_name: row.get(3)?,
                field_id: row.get(4)?,
                field_display_name: row.get(5)?,
                domain_id: row.get(6)?,
                domain_display_name: row.get(7)?,
                description: row.get(8)?,
                keywords: row.get(9)?,
                works_count: row.get(10)?,
                cited_by_count: row.get(11)?,
            })
        },
    )
}

pub fn sources(pool: &SourcePool, ids: &[String]) -> SourceResult<Vec<SourceRow>> {
    query_by_ids(
        pool,
        "sources",
        "SELECT id, issn_l, issn, display_name, publisher, works_count, cited_by_count,
                is_oa, is_in_doaj, homepage_url
         FROM sources WHERE id IN ({ids}) ORDER BY id",
        ids,
        |row| {
            Ok(SourceRow {
                id: row.get(0)?,
                issn_l: row.get(1)?,
                issn: row.get(2)?,
                display_name: row.get(3)?,
                publisher: row.get(4)?,
                works_count: row.get(5)?,
                cited_by_count: row.get(6)?,
                is_oa: row.get(7)?,
                is_in_doaj: row.get(8)?,
                homepage_url: row.get(9)?,
            })
        },
    )
}
