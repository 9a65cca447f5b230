//! Chunked row streams over id lists.

use std::marker::PhantomData;
use std::slice::Chunks;

use crate::pool::{SourceError, SourceResult};
use crate::queries::ID_CHUNK;

/// Rows for consecutive slices of an id list, read one slice at a time.
///
/// Nothing is queried until the next item is pulled, so a consumer holds at
/// most one slice worth of rows. Slices keep the id list's order and each
/// slice keeps the query's own ordering. Row indexes in
/// [`SourceError::DataShape`] count from the start of the stream. The stream
/// ends after the first error.
pub struct RowChunks<'a, T, F> {
    ids: Chunks<'a, String>,
    fetch: F,
    rows_read: usize,
    failed: bool,
    _rows: PhantomData<fn() -> T>,
}

impl<'a, T, F> RowChunks<'a, T, F>
where
    F: FnMut(&[String]) -> SourceResult<Vec<T>>,
{
    /// Read `ids` in slices of [`ID_CHUNK`].
    pub fn new(ids: &'a [String], fetch: F) -> Self {
        Self::with_chunk_size(ids, ID_CHUNK, fetch)
    }

    pub fn with_chunk_size(ids: &'a [String], chunk_size: usize, fetch: F) -> Self {
        Self {
            ids: ids.chunks(chunk_size.max(1)),
            fetch,
            rows_read: 0,
            failed: false,
            _rows: PhantomData,
        }
    }

    /// Rows handed out so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

impl<'a, T, F> Iterator for RowChunks<'a, T, F>
where
    F: FnMut(&[String]) -> SourceResult<Vec<T>>,
{
    type Item = SourceResult<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let slice = self.ids.next()?;

        match (self.fetch)(slice) {
            Ok(rows) => {
                self.rows_read += rows.len();
                Some(Ok(rows))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(match err {
                    SourceError::DataShape {
                        query,
                        row,
                        message,
                    } => SourceError::DataShape {
                        query,
                        row: self.rows_read + row,
                        message,
                    },
                    other => other,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::source::{RelationalSource, SqliteSource};
    use rusqlite::params;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_slices_are_fetched_lazily_in_order() {
        let all = ids(&["W1", "W2", "W3", "W4", "W5"]);
        let mut calls: Vec<Vec<String>> = Vec::new();

        let mut stream = RowChunks::with_chunk_size(&all, 2, |slice| {
            calls.push(slice.to_vec());
            Ok(slice.to_vec())
        });
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first, ids(&["W1", "W2"]));
        assert_eq!(stream.rows_read(), 2);

        let rest: Vec<Vec<String>> = stream.map(Result::unwrap).collect();
        assert_eq!(rest, vec![ids(&["W3", "W4"]), ids(&["W5"])]);
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn test_rows_come_from_the_source_slice_by_slice() {
        let source = SqliteSource::new(fixture::seeded_pool().unwrap());
        let works = ids(&["W1", "W2", "W3", "W4", "W5"]);

        let mut stream = RowChunks::with_chunk_size(&works, 2, |slice| source.authorships(slice));
        let sizes: Vec<usize> = stream.by_ref().map(|rows| rows.unwrap().len()).collect();

        // W1 has two authors, W5 one named author.
        assert_eq!(sizes, vec![3, 2, 1]);
        assert_eq!(stream.rows_read(), 6);
    }

    #[test]
    fn test_data_shape_row_counts_across_slices() {
        let source = SqliteSource::new(fixture::seeded_pool().unwrap());
        source
            .pool()
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE works SET cited_by_count = ?1 WHERE id = ?2",
                    params!["lots", "W4"],
                )?;
                Ok(())
            })
            .unwrap();
        let works = ids(&["W1", "W2", "W3", "W4", "W5"]);

        let mut stream = RowChunks::with_chunk_size(&works, 2, |slice| source.works(slice));
        assert!(stream.next().unwrap().is_ok());
        match stream.next().unwrap() {
            Err(SourceError::DataShape { query, row, .. }) => {
                assert_eq!(query, "works");
                assert_eq!(row, 3);
            }
            other => panic!("expected data-shape error, got {other:?}"),
        }
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_empty_id_list_yields_nothing() {
        let mut stream = RowChunks::new(&[], |_: &[String]| -> SourceResult<Vec<String>> {
            panic!("no slice to fetch")
        });
        assert!(stream.next().is_none());
    }
}
