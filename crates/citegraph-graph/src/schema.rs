//! Neo4j schema initialization (constraints and indexes).

/// Cypher statements for schema initialization.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // Uniqueness constraints
    "CREATE CONSTRAINT work_id IF NOT EXISTS FOR (w:Work) REQUIRE w.id IS UNIQUE",
    "CREATE CONSTRAINT author_id IF NOT EXISTS FOR (a:Author) REQUIRE a.id IS UNIQUE",
    "CREATE CONSTRAINT institution_id IF NOT EXISTS FOR (i:Institution) REQUIRE i.id IS UNIQUE",
    "CREATE CONSTRAINT topic_id IF NOT EXISTS FOR (t:Topic) REQUIRE t.id IS UNIQUE",
    "CREATE CONSTRAINT source_id IF NOT EXISTS FOR (s:Source) REQUIRE s.id IS UNIQUE",
    // Work
    "CREATE INDEX work_year IF NOT EXISTS FOR (w:Work) ON (w.publication_year)",
    "CREATE INDEX work_type IF NOT EXISTS FOR (w:Work) ON (w.type)",
    "CREATE INDEX work_cited_by IF NOT EXISTS FOR (w:Work) ON (w.cited_by_count)",
    "CREATE INDEX work_doi IF NOT EXISTS FOR (w:Work) ON (w.doi)",
    "CREATE INDEX work_in_scope IF NOT EXISTS FOR (w:Work) ON (w.in_scope)",
    // Author
    "CREATE INDEX author_name IF NOT EXISTS FOR (a:Author) ON (a.display_name)",
    "CREATE INDEX author_orcid IF NOT EXISTS FOR (a:Author) ON (a.orcid)",
    "CREATE INDEX author_works_count IF NOT EXISTS FOR (a:Author) ON (a.works_count)",
    // Institution
    "CREATE INDEX institution_country IF NOT EXISTS FOR (i:Institution) ON (i.country_code)",
    "CREATE INDEX institution_type IF NOT EXISTS FOR (i:Institution) ON (i.type)",
    "CREATE INDEX institution_name IF NOT EXISTS FOR (i:Institution) ON (i.display_name)",
    // Topic
    "CREATE INDEX topic_name IF NOT EXISTS FOR (t:Topic) ON (t.display_name)",
    "CREATE INDEX topic_subfield IF NOT EXISTS FOR (t:Topic) ON (t.subfield_id)",
    "CREATE INDEX topic_field IF NOT EXISTS FOR (t:Topic) ON (t.field_id)",
    // Source
    "CREATE INDEX source_name IF NOT EXISTS FOR (s:Source) ON (s.display_name)",
    "CREATE INDEX source_publisher IF NOT EXISTS FOR (s:Source) ON (s.publisher)",
];

#[cfg(test)]
mod tests {
    use super::*;
    use citegraph_core::NodeKind;

    #[test]
    fn test_every_label_has_a_uniqueness_constraint() {
        for kind in NodeKind::ALL {
            let pattern = format!(":{}) REQUIRE", kind.label());
            assert!(
                SCHEMA_STATEMENTS
                    .iter()
                    .any(|s| s.contains(&pattern) && s.contains("IS UNIQUE")),
                "no constraint for {}",
                kind
            );
        }
    }

    #[test]
    fn test_statements_are_idempotent() {
        assert!(SCHEMA_STATEMENTS.iter().all(|s| s.contains("IF NOT EXISTS")));
    }
}
