//! Schema reconciliation between an incoming sheet and its destination table.
//!
//! The template whitelist decides which incoming columns are persisted; the
//! live table only ever grows to cover them. Evolution policy:
//!
//! - a new table is created with exactly the persisted columns plus the
//!   metadata columns, each typed from the observed data;
//! - an existing table gains missing columns one `ALTER TABLE ... ADD COLUMN`
//!   at a time, always typed [`ADDITIVE_COLUMN_TYPE`]. Columns are never
//!   dropped or retyped;
//! - a failing additive change is logged and skipped, and the column is left
//!   out of the load that follows.

use std::collections::{BTreeSet, HashSet};

use log::{info, warn};

use crate::{
    error::{IngestError, error_chain},
    ident::Identifier,
    registry::SchemaRegistry,
    schema::{ADDITIVE_COLUMN_TYPE, StorageType},
    store::Store,
};

pub const FILE_NAME_COLUMN: &str = "File_Name";
pub const SHEET_NAME_COLUMN: &str = "Sheet_Name";
pub const INSERTED_AT_COLUMN: &str = "Bulk_Insert_DateTime";
pub const SHIFTED_COLUMN: &str = "IsShifted";

/// Columns attached to every loaded row, in table order.
pub const METADATA_COLUMNS: [(&str, StorageType); 4] = [
    (FILE_NAME_COLUMN, StorageType::Text),
    (SHEET_NAME_COLUMN, StorageType::Text),
    (INSERTED_AT_COLUMN, StorageType::Timestamp),
    (SHIFTED_COLUMN, StorageType::Boolean),
];

/// Identifiers are case-insensitive in the store, so `FILE_NAME` is a
/// metadata column too.
pub fn is_metadata_column(name: &str) -> bool {
    METADATA_COLUMNS
        .iter()
        .any(|(column, _)| column.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    /// Whitelisted incoming columns, in incoming order.
    pub persisted: Vec<Identifier>,
    /// Incoming columns left out, with the reason.
    pub dropped: Vec<(String, DropReason)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotWhitelisted,
    InvalidIdentifier,
    Metadata,
    /// Same name as an earlier persisted column, ignoring case.
    Duplicate,
}

/// Intersects incoming columns with the template whitelist. Of several
/// columns equal up to case, only the first is persisted.
pub fn select_columns(incoming: &[String], whitelist: &BTreeSet<String>) -> ColumnSelection {
    let mut persisted = Vec::new();
    let mut dropped = Vec::new();
    let mut seen = HashSet::new();
    for name in incoming {
        if is_metadata_column(name) {
            dropped.push((name.clone(), DropReason::Metadata));
        } else if !whitelist.contains(name) {
            dropped.push((name.clone(), DropReason::NotWhitelisted));
        } else if !seen.insert(name.to_ascii_lowercase()) {
            dropped.push((name.clone(), DropReason::Duplicate));
        } else {
            match Identifier::parse("column", name) {
                Ok(ident) => persisted.push(ident),
                Err(_) => dropped.push((name.clone(), DropReason::InvalidIdentifier)),
            }
        }
    }
    ColumnSelection { persisted, dropped }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub persisted: Vec<Identifier>,
    pub created: bool,
    pub added: Vec<Identifier>,
    /// Additive changes the store refused, with its error text.
    pub failed: Vec<(Identifier, String)>,
}

impl ReconcileOutcome {
    /// Columns the batch loader writes: persisted columns then metadata,
    /// minus any column whose additive change failed.
    pub fn load_columns(&self) -> Vec<Identifier> {
        let failed = self
            .failed
            .iter()
            .map(|(column, _)| column)
            .collect::<Vec<_>>();
        self.persisted
            .iter()
            .cloned()
            .chain(metadata_identifiers())
            .filter(|column| !failed.contains(&column))
            .collect()
    }
}

fn metadata_identifiers() -> impl Iterator<Item = Identifier> {
    METADATA_COLUMNS
        .iter()
        .filter_map(|(name, _)| Identifier::parse("column", name).ok())
}

/// Makes `table` a superset of the whitelisted incoming columns.
///
/// `column_type_of` is consulted only when the table is created.
pub fn reconcile<S, F>(
    store: &mut S,
    table: &Identifier,
    incoming: &[String],
    whitelist: &BTreeSet<String>,
    column_type_of: F,
) -> Result<ReconcileOutcome, IngestError>
where
    S: Store + ?Sized,
    F: Fn(&str) -> StorageType,
{
    let selection = select_columns(incoming, whitelist);
    for (name, reason) in &selection.dropped {
        match reason {
            DropReason::InvalidIdentifier => {
                warn!("Column '{name}' is whitelisted but not a valid identifier; dropping it")
            }
            DropReason::Duplicate => {
                warn!("Column '{name}' repeats an earlier column up to case; dropping it")
            }
            DropReason::NotWhitelisted | DropReason::Metadata => {}
        }
    }
    if selection.persisted.is_empty() {
        return Err(IngestError::NoMatchingColumns {
            table: table.to_string(),
        });
    }

    let mut outcome = ReconcileOutcome {
        persisted: selection.persisted,
        ..ReconcileOutcome::default()
    };

    let mut registry = SchemaRegistry::new(store);
    if !registry.table_exists(table)? {
        create_table(store, table, &outcome.persisted, &column_type_of)?;
        outcome.created = true;
        return Ok(outcome);
    }

    let live = registry
        .live_columns(table)?
        .into_iter()
        .map(|name| name.to_ascii_lowercase())
        .collect::<BTreeSet<_>>();
    let missing = outcome
        .persisted
        .iter()
        .cloned()
        .chain(metadata_identifiers())
        .filter(|column| !live.contains(&column.as_str().to_ascii_lowercase()))
        .collect::<Vec<_>>();

    for column in missing {
        match add_column(store, table, &column) {
            Ok(()) => {
                info!("Added column '{column}' to table '{table}'");
                outcome.added.push(column);
            }
            Err(err) => {
                let message = error_chain(&err);
                warn!("Error adding column '{column}' to table '{table}': {message}");
                outcome.failed.push((column, message));
            }
        }
    }
    Ok(outcome)
}

fn create_table<S, F>(
    store: &mut S,
    table: &Identifier,
    persisted: &[Identifier],
    column_type_of: &F,
) -> Result<(), IngestError>
where
    S: Store + ?Sized,
    F: Fn(&str) -> StorageType,
{
    let definitions = persisted
        .iter()
        .map(|column| (column.quoted(), column_type_of(column.as_str())))
        .chain(
            METADATA_COLUMNS
                .iter()
                .map(|(name, ty)| (format!("\"{name}\""), *ty)),
        )
        .map(|(column, ty)| format!("{column} {}", ty.sql_type()))
        .collect::<Vec<_>>();
    let sql = format!(
        "CREATE TABLE {} ({}) STRICT",
        table.quoted(),
        definitions.join(", ")
    );
    info!("Creating new table: {table}");
    store.execute(&sql, &[])?;
    Ok(())
}

fn add_column<S>(store: &mut S, table: &Identifier, column: &Identifier) -> Result<(), IngestError>
where
    S: Store + ?Sized,
{
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table.quoted(),
        column.quoted(),
        ADDITIVE_COLUMN_TYPE.sql_type()
    );
    store.execute(&sql, &[])?;
    Ok(())
}
