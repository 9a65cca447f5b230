//! Extraction queries against the OpenAlex mirror.
//!
//! Every filter value is bound as a parameter. Id-list lookups are split into
//! chunks of [`ID_CHUNK`] bound parameters each.

pub mod entities;
pub mod links;
pub mod scope;

use rusqlite::{params_from_iter, Row};

use crate::pool::{SourceError, SourcePool, SourceResult};

/// Maximum number of ids bound into a single statement.
pub const ID_CHUNK: usize = 500;

/// `?, ?, ?` for `n` bound parameters.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Run `sql` once per chunk of `ids`, substituting the `{ids}` marker with a
/// placeholder list, and map every row.
///
/// Row indexes in [`SourceError::DataShape`] count across chunks.
pub(crate) fn query_by_ids<T, F>(
    pool: &SourcePool,
    name: &'static str,
    sql: &str,
    ids: &[String],
    mut map: F,
) -> SourceResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    pool.with_conn(|conn| {
        let mut out = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let statement = sql.replace("{ids}", &placeholders(chunk.len()));
            let mut stmt = conn.prepare(&statement)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let item = map(row).map_err(|e| SourceError::from_row_error(name, out.len(), e))?;
                out.push(item);
            }
        }
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
