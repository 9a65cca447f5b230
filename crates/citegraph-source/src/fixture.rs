//! A small seeded OpenAlex mirror.
//!
//! Works `W1..W5` are in scope (subfield 2507, year 2024). `W6` and `W9` are
//! tagged with the subfield but published in 2023, `W7` belongs to another
//! subfield, `W8` and `W10` carry no topic. The citation relation is:
//!
//! ```text
//! W1->W6  W1->W6  W2->W6  W3->W6  W4->W9  W1->W2  W7->W6  W8->W3
//! ```

use citegraph_core::ScopeConfig;
use rusqlite::{params, Connection};

use crate::migrations::run_migrations;
use crate::pool::{SourcePool, SourceResult};

pub const SUBFIELD: &str = "https://openalex.org/subfields/2507";
pub const YEAR: i64 = 2024;

/// The scope that selects `W1..W5`.
pub fn scope() -> ScopeConfig {
    ScopeConfig {
        subfield_id: SUBFIELD.to_string(),
        publication_year: YEAR,
    }
}

/// In-memory mirror with migrations applied and fixture rows inserted.
pub fn seeded_pool() -> SourceResult<SourcePool> {
    let pool = SourcePool::in_memory()?;
    seed(&pool)?;
    Ok(pool)
}

/// Apply migrations and insert the fixture rows into `pool`.
pub fn seed(pool: &SourcePool) -> SourceResult<()> {
    run_migrations(pool)?;
    pool.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        insert_rows(&tx)?;
        tx.commit()?;
        Ok(())
    })
}

fn insert_rows(conn: &Connection) -> rusqlite::Result<()> {
    let works: [(&str, i64, Option<&str>); 10] = [
        ("W1", 2024, Some("10.1000/w1")),
        ("W2", 2024, Some("10.1000/w2")),
        ("W3", 2024, None),
        ("W4", 2024, Some("10.1000/w4")),
        ("W5", 2024, None),
        ("W6", 2023, Some("10.1000/w6")),
        ("W7", 2024, None),
        ("W8", 2024, None),
        ("W9", 2023, None),
        ("W10", 2022, None),
    ];
    for (i, (id, year, doi)) in works.iter().enumerate() {
        conn.execute(
            "INSERT INTO works (id, doi, title, display_name, publication_year,
                                publication_date, type, cited_by_count, is_retracted,
                                is_paratext, language)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, 'article', ?6, 0, 0, 'en')",
            params![
                id,
                doi,
                format!("Work {}", id),
                year,
                format!("{}-06-01", year),
                i as i64 * 3
            ],
        )?;
    }

    for (id, name, subfield) in [
        ("T1", "Polymer composites", SUBFIELD),
        ("T2", "Coastal erosion", "https://openalex.org/subfields/1904"),
        ("T3", "Biomaterials", SUBFIELD),
    ] {
        conn.execute(
            "INSERT INTO topics (id, display_name, subfield_id, subfield_display_name,
                                 field_id, field_display_name, domain_id,
                                 domain_display_name, keywords, works_count, cited_by_count)
             VALUES (?1, ?2, ?3, 'Subfield', 'F1', 'Field', 'D1', 'Domain', '[\"x\"]', 10, 100)",
            params![id, name, subfield],
        )?;
    }

    for (work, topic, score) in [
        ("W1", "T1", 0.9),
        ("W1", "T3", 0.4),
        ("W2", "T1", 0.8),
        ("W3", "T1", 0.7),
        ("W4", "T1", 0.6),
        ("W5", "T1", 0.5),
        ("W6", "T1", 0.9),
        ("W7", "T2", 0.9),
        ("W9", "T3", 0.2),
    ] {
        conn.execute(
            "INSERT INTO works_topics (work_id, topic_id, score) VALUES (?1, ?2, ?3)",
            params![work, topic, score],
        )?;
    }

    for (id, name, orcid) in [
        ("A1", "Ada Author", Some("0000-0001")),
        ("A2", "Bo Writer", None),
        ("A3", "Cy Scholar", Some("0000-0003")),
    ] {
        conn.execute(
            "INSERT INTO authors (id, orcid, display_name, display_name_alternatives,
                                  works_count, cited_by_count)
             VALUES (?1, ?2, ?3, '[]', 5, 50)",
            params![id, orcid, name],
        )?;
    }

    for (id, name, country) in [("I1", "North University", "BR"), ("I2", "South Institute", "PT")] {
        conn.execute(
            "INSERT INTO institutions (id, ror, display_name, country_code, type,
                                       homepage_url, works_count, cited_by_count)
             VALUES (?1, NULL, ?2, ?3, 'education', NULL, 1000, 9000)",
            params![id, name, country],
        )?;
    }

    conn.execute(
        "INSERT INTO sources (id, issn_l, issn, display_name, publisher, works_count,
                              cited_by_count, is_oa, is_in_doaj, homepage_url)
         VALUES ('S1', '1234-5678', '[\"1234-5678\"]', 'Journal of Materials',
                 'Materials Press', 300, 3000, 1, 0, NULL)",
        [],
    )?;

    for (work, position, author, institution) in [
        ("W1", "first", Some("A1"), Some("I1")),
        ("W1", "last", Some("A2"), Some("I2")),
        ("W2", "first", Some("A1"), Some("I1")),
        ("W3", "first", Some("A3"), None),
        ("W4", "first", Some("A2"), Some("I1")),
        ("W5", "first", Some("A3"), Some("I2")),
        ("W5", "middle", None, None),
        ("W7", "first", Some("A1"), Some("I1")),
    ] {
        conn.execute(
            "INSERT INTO works_authorships (work_id, author_position, author_id, institution_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![work, position, author, institution],
        )?;
    }

    for (work, is_oa) in [("W1", true), ("W2", false), ("W3", true), ("W4", true)] {
        conn.execute(
            "INSERT INTO works_primary_locations (work_id, source_id, is_oa, version)
             VALUES (?1, 'S1', ?2, 'publishedVersion')",
            params![work, is_oa],
        )?;
    }
    conn.execute(
        "INSERT INTO works_primary_locations (work_id, source_id, is_oa, version)
         VALUES ('W5', NULL, 0, NULL)",
        [],
    )?;

    for (citing, cited) in [
        ("W1", "W6"),
        ("W1", "W6"),
        ("W2", "W6"),
        ("W3", "W6"),
        ("W4", "W9"),
        ("W1", "W2"),
        ("W7", "W6"),
        ("W8", "W3"),
    ] {
        conn.execute(
            "INSERT INTO works_referenced_works (work_id, referenced_work_id) VALUES (?1, ?2)",
            params![citing, cited],
        )?;
    }

    for (work, related) in [("W1", "W2"), ("W2", "W1"), ("W3", "W7")] {
        conn.execute(
            "INSERT INTO works_related_works (work_id, related_work_id) VALUES (?1, ?2)",
            params![work, related],
        )?;
    }

    Ok(())
}
