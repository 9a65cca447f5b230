//! Schema of the OpenAlex relational mirror.

use crate::pool::{SourceError, SourcePool, SourceResult};
use rusqlite_migration::{Migrations, M};

/// SQL schema definition.
const SCHEMA: &str = include_str!("schema.sql");

/// Run all migrations against a writable mirror.
pub fn run_migrations(pool: &SourcePool) -> SourceResult<()> {
    let migrations = Migrations::new(vec![M::up(SCHEMA)]);

    pool.with_conn_mut(|conn| {
        migrations
            .to_latest(conn)
            .map_err(|e| SourceError::Migration(e.to_string()))
    })
}
