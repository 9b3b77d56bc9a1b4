//! Chunked bulk inserts with per-chunk failure isolation.

use itertools::Itertools;
use log::{debug, warn};

use crate::{
    data::Row,
    error::{StoreError, error_chain},
    ident::Identifier,
    ledger::{InsertionErrorRecord, record_insertion_error},
    store::Store,
};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_inserted: usize,
    pub chunks: usize,
    /// Starting row index of every rejected chunk.
    pub failed_chunks: Vec<usize>,
}

impl LoadReport {
    pub fn absorb(&mut self, other: &LoadReport) {
        self.rows_inserted += other.rows_inserted;
        self.chunks += other.chunks;
        self.failed_chunks.extend(other.failed_chunks.iter().copied());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchLoader {
    chunk_size: usize,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BatchLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Inserts `rows` (already projected onto `columns`) in chunks.
    ///
    /// A rejected chunk is recorded as one insertion error at its starting row
    /// index and the next chunk is attempted. The work is committed once, after
    /// the last chunk. Only audit or commit failures are returned as errors.
    pub fn load<S: Store + ?Sized>(
        &self,
        store: &mut S,
        table: &Identifier,
        file_name: &str,
        columns: &[Identifier],
        rows: &[Row],
    ) -> Result<LoadReport, StoreError> {
        let sql = insert_statement(table, columns);
        let mut report = LoadReport::default();
        for (chunk_idx, chunk) in rows.chunks(self.chunk_size).enumerate() {
            let start = chunk_idx * self.chunk_size;
            report.chunks += 1;
            match store.execute_many(&sql, chunk) {
                Ok(_) => {
                    report.rows_inserted += chunk.len();
                    debug!(
                        "Inserted rows {}..{} into {table}",
                        start,
                        start + chunk.len()
                    );
                }
                Err(err) => {
                    let message = error_chain(&err);
                    warn!("Chunk starting at row {start} of '{file_name}' rejected by {table}: {message}");
                    record_insertion_error(
                        store,
                        &InsertionErrorRecord {
                            table_name: table.to_string(),
                            file_name: file_name.to_string(),
                            row_index: start as i64,
                            message,
                        },
                    )?;
                    report.failed_chunks.push(start);
                }
            }
        }
        store.commit()?;
        Ok(report)
    }
}

pub fn insert_statement(table: &Identifier, columns: &[Identifier]) -> String {
    let column_list = columns.iter().map(Identifier::quoted).join(", ");
    let placeholders = (1..=columns.len()).map(|idx| format!("?{idx}")).join(", ");
    format!(
        "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
        table.quoted()
    )
}
