//! System tables: source folders, the processed-file log and the
//! insertion-error audit trail.

use std::collections::HashSet;

use log::debug;

use crate::{
    data::{Row, Value},
    error::StoreError,
    store::Store,
};

pub const SOURCE_FOLDERS_TABLE: &str = "SourceFolders";
pub const PROCESSED_FILES_TABLE: &str = "ProcessedFilesLog";
pub const INSERTION_ERRORS_TABLE: &str = "Insertion_Errors";

const SYSTEM_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS SourceFolders (
        SourceFolderPath TEXT NOT NULL,
        Type TEXT NOT NULL,
        IsActive INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS ProcessedFilesLog (
        File_Name TEXT NOT NULL,
        File_Path TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS Insertion_Errors (
        File_Name TEXT,
        Sheet_Name TEXT,
        Row_Index INTEGER,
        Error_Message TEXT
    )",
];

/// Creates any missing system table. Template tables are operator-owned and
/// never created here.
pub fn bootstrap_system_tables<S: Store + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    for ddl in SYSTEM_TABLES {
        store.execute(ddl, &[])?;
    }
    store.commit()
}

/// One chunk or file that failed without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionErrorRecord {
    pub table_name: String,
    pub file_name: String,
    pub row_index: i64,
    pub message: String,
}

fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

fn text_at(row: &Row, idx: usize) -> String {
    row.get(idx)
        .and_then(|cell| cell.as_ref())
        .map(Value::as_display)
        .unwrap_or_default()
}

/// Appends an audit record. The caller decides when to commit.
///
/// Legacy audit layout: the destination table is stored in `File_Name` and the
/// originating file in `Sheet_Name`.
pub fn record_insertion_error<S: Store + ?Sized>(
    store: &mut S,
    record: &InsertionErrorRecord,
) -> Result<(), StoreError> {
    debug!(
        "Recording insertion error for {} row {}",
        record.file_name, record.row_index
    );
    store.execute(
        "INSERT INTO Insertion_Errors (File_Name, Sheet_Name, Row_Index, Error_Message)
         VALUES (?1, ?2, ?3, ?4)",
        &[
            text(&record.table_name),
            text(&record.file_name),
            Some(Value::Integer(record.row_index)),
            text(&record.message),
        ],
    )?;
    Ok(())
}

pub fn insertion_errors<S: Store + ?Sized>(
    store: &mut S,
) -> Result<Vec<InsertionErrorRecord>, StoreError> {
    let rows = store.fetch_all(
        "SELECT File_Name, Sheet_Name, Row_Index, Error_Message FROM Insertion_Errors ORDER BY rowid",
        &[],
    )?;
    Ok(rows
        .iter()
        .map(|row| InsertionErrorRecord {
            table_name: text_at(row, 0),
            file_name: text_at(row, 1),
            row_index: match row.get(2) {
                Some(Some(Value::Integer(idx))) => *idx,
                _ => 0,
            },
            message: text_at(row, 3),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFileRecord {
    pub file_name: String,
    pub file_path: String,
}

pub fn record_processed_file<S: Store + ?Sized>(
    store: &mut S,
    record: &ProcessedFileRecord,
) -> Result<(), StoreError> {
    store.execute(
        "INSERT INTO ProcessedFilesLog (File_Name, File_Path) VALUES (?1, ?2)",
        &[text(&record.file_name), text(&record.file_path)],
    )?;
    Ok(())
}

/// File names already loaded, as persisted in the processed-file log.
///
/// Always rebuilt from the store rather than patched in place, so the set
/// matches the store of record at each reload point.
#[derive(Debug, Clone, Default)]
pub struct ProcessedFiles {
    names: HashSet<String>,
}

impl ProcessedFiles {
    pub fn load<S: Store + ?Sized>(store: &mut S) -> Result<Self, StoreError> {
        let rows = store.fetch_all("SELECT File_Name FROM ProcessedFilesLog", &[])?;
        let names = rows
            .iter()
            .map(|row| text_at(row, 0))
            .filter(|name| !name.is_empty())
            .collect();
        Ok(Self { names })
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
