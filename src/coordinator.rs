//! Ingestion Coordinator.
//!
//! Drives every active source folder through the per-file pipeline:
//! template resolution, per-sheet normalization, reconciliation and bulk load,
//! then archival and the processed-file record. A failing file is rolled back,
//! audited at row 0 and left in place for the next run; the run continues.

use std::{
    collections::{BTreeSet, HashSet},
    fmt::Write as _,
    path::PathBuf,
};

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    archive::Archiver,
    config::Config,
    data::{Row, Value},
    discovery::{self, CandidateFile, SourceFolder},
    error::{IngestError, StoreError, error_chain},
    ident::Identifier,
    ledger::{
        InsertionErrorRecord, ProcessedFileRecord, ProcessedFiles, record_insertion_error,
        record_processed_file,
    },
    loader::{BatchLoader, LoadReport},
    normalize::normalize,
    reconcile::{FILE_NAME_COLUMN, INSERTED_AT_COLUMN, SHEET_NAME_COLUMN, SHIFTED_COLUMN, reconcile},
    registry::SchemaRegistry,
    routing,
    schema::{StorageType, infer_column_types},
    store::Store,
    workbook::{Sheet, WorkbookReader},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Loaded(LoadReport),
    /// No template governs the folder's category.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub folder: PathBuf,
    pub category: String,
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows_inserted: usize,
    pub failed_chunks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub folders: Vec<FolderSummary>,
}

impl RunSummary {
    pub fn files_loaded(&self) -> usize {
        self.folders.iter().map(|f| f.loaded).sum()
    }

    pub fn files_skipped(&self) -> usize {
        self.folders.iter().map(|f| f.skipped).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.folders.iter().map(|f| f.failed).sum()
    }

    pub fn rows_inserted(&self) -> usize {
        self.folders.iter().map(|f| f.rows_inserted).sum()
    }

    pub fn failed_chunks(&self) -> usize {
        self.folders.iter().map(|f| f.failed_chunks).sum()
    }

    /// Column-aligned table, one line per folder plus a total line.
    pub fn render(&self) -> String {
        let headers = [
            "Folder", "Type", "Loaded", "Skipped", "Failed", "Rows", "Failed chunks",
        ]
        .map(String::from)
        .to_vec();
        let mut rows = self
            .folders
            .iter()
            .map(|f| {
                vec![
                    f.folder.display().to_string(),
                    f.category.clone(),
                    f.loaded.to_string(),
                    f.skipped.to_string(),
                    f.failed.to_string(),
                    f.rows_inserted.to_string(),
                    f.failed_chunks.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        rows.push(vec![
            "Total".to_string(),
            String::new(),
            self.files_loaded().to_string(),
            self.files_skipped().to_string(),
            self.files_failed().to_string(),
            self.rows_inserted().to_string(),
            self.failed_chunks().to_string(),
        ]);

        let widths = (0..headers.len())
            .map(|idx| {
                rows.iter()
                    .map(|row| row[idx].chars().count())
                    .chain(std::iter::once(headers[idx].chars().count()))
                    .max()
                    .unwrap_or(1)
            })
            .collect::<Vec<_>>();
        let separators = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();

        let mut output = String::new();
        for line in std::iter::once(&headers)
            .chain(std::iter::once(&separators))
            .chain(rows.iter())
        {
            let rendered = line
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .join("  ");
            let _ = writeln!(output, "{}", rendered.trim_end());
        }
        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

pub struct Coordinator<'a, S: Store + ?Sized, R: WorkbookReader> {
    store: &'a mut S,
    reader: R,
    config: &'a Config,
    loader: BatchLoader,
    archiver: Archiver,
    processed: ProcessedFiles,
}

impl<'a, S: Store + ?Sized, R: WorkbookReader> Coordinator<'a, S, R> {
    /// `run_started` names the archive folders for the whole run.
    pub fn new(store: &'a mut S, reader: R, config: &'a Config, run_started: NaiveDateTime) -> Self {
        Self {
            store,
            reader,
            config,
            loader: BatchLoader::new(config.chunk_size),
            archiver: Archiver::new(config.output_root.clone(), run_started),
            processed: ProcessedFiles::default(),
        }
    }

    /// One full pass over every active source folder. Only store failures
    /// outside any single file end the pass early.
    pub fn run(&mut self) -> Result<RunSummary, StoreError> {
        self.processed = ProcessedFiles::load(self.store)?;
        debug!("{} file(s) already processed", self.processed.len());
        let folders = discovery::active_source_folders(self.store)?;
        let mut summary = RunSummary::default();
        for folder in folders {
            summary.folders.push(self.run_folder(&folder));
        }
        Ok(summary)
    }

    fn run_folder(&mut self, folder: &SourceFolder) -> FolderSummary {
        info!(
            "Scanning folder {:?} of type '{}'",
            folder.path, folder.category
        );
        let mut summary = FolderSummary {
            folder: folder.path.clone(),
            category: folder.category.clone(),
            ..FolderSummary::default()
        };
        let files = match discovery::enumerate_files(&folder.path, self.config) {
            Ok(files) => files,
            Err(err) => {
                warn!("Cannot enumerate {:?}: {err:#}", folder.path);
                return summary;
            }
        };
        for file in files {
            if !discovery::is_candidate(&file, &self.processed) {
                debug!("'{}' already processed", file.file_name);
                continue;
            }
            info!("Processing file '{}'", file.file_name);
            let table = routing::destination_table(
                &file.file_name,
                &folder.category,
                &self.config.special_keywords,
            );
            match self.process_file(folder, &file, &table) {
                Ok(FileOutcome::Loaded(report)) => {
                    summary.loaded += 1;
                    summary.rows_inserted += report.rows_inserted;
                    summary.failed_chunks += report.failed_chunks.len();
                }
                Ok(FileOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    self.record_file_failure(&table, &file, &err);
                }
            }
        }
        summary
    }

    /// Loads every sheet of one file, archives it and records it processed.
    pub fn process_file(
        &mut self,
        folder: &SourceFolder,
        file: &CandidateFile,
        table_name: &str,
    ) -> Result<FileOutcome> {
        let Some(template_name) =
            routing::resolve_template(&self.config.category_templates, &folder.category)
        else {
            info!(
                "No template matches type '{}' for file '{}'. Skipping file.",
                folder.category, file.file_name
            );
            return Ok(FileOutcome::Skipped);
        };
        let template = Identifier::parse("template table", template_name)?;
        let whitelist = match SchemaRegistry::new(self.store).template_columns(&template) {
            Ok(whitelist) => whitelist,
            Err(IngestError::TemplateNotFound { name }) => {
                info!(
                    "Template table '{name}' does not exist. Skipping file '{}'.",
                    file.file_name
                );
                return Ok(FileOutcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        };
        let table = Identifier::parse("table", table_name)?;

        let workbook = self.reader.read(&file.path)?;
        let mut report = LoadReport::default();
        for sheet in &workbook.sheets {
            if let Some(sheet_report) =
                self.load_sheet(&table, &whitelist, &file.file_name, sheet)?
            {
                report.absorb(&sheet_report);
            }
        }

        self.archiver
            .archive(&file.path, &file.relative_dir, table.as_str())?;
        record_processed_file(
            self.store,
            &ProcessedFileRecord {
                file_name: file.file_name.clone(),
                file_path: file.path.display().to_string(),
            },
        )?;
        self.store.commit()?;
        self.processed = ProcessedFiles::load(self.store)?;
        Ok(FileOutcome::Loaded(report))
    }

    /// Returns `None` when the sheet is skipped (no rows or no whitelisted
    /// column).
    fn load_sheet(
        &mut self,
        table: &Identifier,
        whitelist: &BTreeSet<String>,
        file_name: &str,
        sheet: &Sheet,
    ) -> Result<Option<LoadReport>, IngestError> {
        if sheet.is_empty() {
            info!("Sheet '{}' is empty. Skipping.", sheet.name);
            return Ok(None);
        }
        let columns = normalized_columns(&sheet.columns);
        let types = infer_column_types(sheet.columns.len(), &sheet.rows);
        let incoming = columns
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();
        let type_of = |name: &str| {
            columns
                .iter()
                .find(|(column, _)| column == name)
                .and_then(|(_, idx)| types.get(*idx).copied())
                .unwrap_or(StorageType::Text)
        };

        let outcome = match reconcile(self.store, table, &incoming, whitelist, type_of) {
            Ok(outcome) => outcome,
            Err(IngestError::NoMatchingColumns { .. }) => {
                info!("No matching columns in sheet '{}'. Skipping.", sheet.name);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let load_columns = outcome.load_columns();
        let metadata = SheetMetadata {
            file_name,
            sheet_name: &sheet.name,
            inserted_at: Local::now().naive_local(),
        };
        let rows = sheet
            .rows
            .iter()
            .map(|row| project_row(row, &load_columns, &columns, &metadata))
            .collect::<Vec<_>>();
        let report = self
            .loader
            .load(self.store, table, file_name, &load_columns, &rows)?;
        info!(
            "Loaded {} of {} row(s) from sheet '{}' into '{table}'",
            report.rows_inserted,
            rows.len(),
            sheet.name
        );
        Ok(Some(report))
    }

    fn record_file_failure(&mut self, table: &str, file: &CandidateFile, err: &anyhow::Error) {
        warn!("Error processing file {}: {err:#}", file.file_name);
        if let Err(rollback_err) = self.store.rollback() {
            warn!(
                "Rollback after failure in '{}' failed: {}",
                file.file_name,
                error_chain(&rollback_err)
            );
        }
        let record = InsertionErrorRecord {
            table_name: table.to_string(),
            file_name: file.file_name.clone(),
            row_index: 0,
            message: format!("{err:#}"),
        };
        let recorded = record_insertion_error(self.store, &record).and_then(|()| self.store.commit());
        if let Err(audit_err) = recorded {
            warn!(
                "Could not record the failure of '{}': {}",
                file.file_name,
                error_chain(&audit_err)
            );
        }
    }
}

struct SheetMetadata<'a> {
    file_name: &'a str,
    sheet_name: &'a str,
    inserted_at: NaiveDateTime,
}

impl SheetMetadata<'_> {
    fn value_for(&self, column: &str) -> Option<Option<Value>> {
        match column {
            FILE_NAME_COLUMN => Some(Some(Value::String(self.file_name.to_string()))),
            SHEET_NAME_COLUMN => Some(Some(Value::String(self.sheet_name.to_string()))),
            INSERTED_AT_COLUMN => Some(Some(Value::DateTime(self.inserted_at))),
            SHIFTED_COLUMN => Some(Some(Value::Boolean(false))),
            _ => None,
        }
    }
}

/// Normalized column names paired with their source index. When two raw
/// names normalize to the same identifier, ignoring case, the first one wins.
fn normalized_columns(raw: &[String]) -> Vec<(String, usize)> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(raw.len());
    for (idx, name) in raw.iter().enumerate() {
        let normalized = normalize(name).into_owned();
        if seen.insert(normalized.to_ascii_lowercase()) {
            columns.push((normalized, idx));
        } else {
            warn!("Column '{name}' duplicates '{normalized}' after normalization; dropping it");
        }
    }
    columns
}

fn project_row(
    row: &Row,
    load_columns: &[Identifier],
    columns: &[(String, usize)],
    metadata: &SheetMetadata<'_>,
) -> Row {
    load_columns
        .iter()
        .map(|column| {
            metadata.value_for(column.as_str()).unwrap_or_else(|| {
                columns
                    .iter()
                    .find(|(name, _)| name == column.as_str())
                    .and_then(|(_, idx)| row.get(*idx).cloned().flatten())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn duplicate_normalized_columns_keep_the_first() {
        let columns = normalized_columns(&names(&["Unit #", "Unit No", "A - 1", "Land Use"]));
        assert_eq!(
            columns,
            vec![
                ("Unit_No".to_string(), 0),
                ("A_1".to_string(), 2),
                ("Land_Uses".to_string(), 3),
            ]
        );
    }

    #[test]
    fn columns_differing_only_in_case_keep_the_first() {
        let columns = normalized_columns(&names(&["Owner", "OWNER", "owner name", "Owner Name"]));
        assert_eq!(
            columns,
            vec![("Owner".to_string(), 0), ("owner_name".to_string(), 2)]
        );
    }

    #[test]
    fn project_row_fills_metadata_and_nulls() {
        let columns = normalized_columns(&names(&["B", "A", "File Name"]));
        let load_columns = ["A", "B", "File_Name", "IsShifted"]
            .iter()
            .map(|name| Identifier::parse("column", name).unwrap())
            .collect::<Vec<_>>();
        let inserted_at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let metadata = SheetMetadata {
            file_name: "june.xlsx",
            sheet_name: "Sheet1",
            inserted_at,
        };
        let row = vec![None, Some(Value::Integer(4)), Some(Value::String("spoof".into()))];
        assert_eq!(
            project_row(&row, &load_columns, &columns, &metadata),
            vec![
                Some(Value::Integer(4)),
                None,
                Some(Value::String("june.xlsx".into())),
                Some(Value::Boolean(false)),
            ]
        );
    }

    #[test]
    fn summary_renders_totals() {
        let summary = RunSummary {
            folders: vec![
                FolderSummary {
                    folder: PathBuf::from("/in/a"),
                    category: "Sauce1".into(),
                    loaded: 2,
                    rows_inserted: 10,
                    ..FolderSummary::default()
                },
                FolderSummary {
                    folder: PathBuf::from("/in/b"),
                    category: "Sauce2".into(),
                    failed: 1,
                    failed_chunks: 3,
                    ..FolderSummary::default()
                },
            ],
        };
        assert_eq!(summary.files_loaded(), 2);
        assert_eq!(summary.failed_chunks(), 3);
        let rendered = summary.render();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Folder  Type    Loaded"));
        assert!(lines[1].starts_with("------  ------"));
        assert!(lines[4].starts_with("Total"));
        assert!(lines[4].contains("10"));
    }
}
