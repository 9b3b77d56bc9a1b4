//! Source folders and candidate file enumeration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use log::{debug, warn};

use crate::{
    config::Config,
    data::Value,
    error::StoreError,
    ledger::ProcessedFiles,
    store::Store,
};

const LOCK_FILE_PREFIX: &str = "~$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub path: PathBuf,
    /// Category string used for template resolution and default table naming.
    pub category: String,
}

/// Active source folders in store order.
pub fn active_source_folders<S: Store + ?Sized>(store: &mut S) -> Result<Vec<SourceFolder>, StoreError> {
    let rows = store.fetch_all(
        "SELECT SourceFolderPath, Type FROM SourceFolders WHERE IsActive = 1 ORDER BY rowid",
        &[],
    )?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let mut cells = row.into_iter();
            let path = cells.next().flatten()?;
            let category = cells.next().flatten()?;
            Some(SourceFolder {
                path: PathBuf::from(path.as_display()),
                category: category.as_display(),
            })
        })
        .collect())
}

/// Registers a source folder; used by operators and tests to seed the store.
pub fn register_source_folder<S: Store + ?Sized>(
    store: &mut S,
    path: &Path,
    category: &str,
) -> Result<(), StoreError> {
    store.execute(
        "INSERT INTO SourceFolders (SourceFolderPath, Type, IsActive) VALUES (?1, ?2, 1)",
        &[
            Some(Value::String(path.display().to_string())),
            Some(Value::String(category.to_string())),
        ],
    )?;
    store.commit()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Directory of the file relative to its source folder.
    pub relative_dir: PathBuf,
}

/// Recursively lists spreadsheet files under `folder`, sorted by path.
///
/// Office lock files are skipped. Already-processed files are not filtered
/// here: the processed set can change while a folder is being worked through.
pub fn enumerate_files(folder: &Path, config: &Config) -> Result<Vec<CandidateFile>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(folder)
        .standard_filters(false)
        .follow_links(false)
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {folder:?}: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(file_name) = path.file_name().map(|name| name.to_string_lossy().into_owned())
        else {
            continue;
        };
        if file_name.starts_with(LOCK_FILE_PREFIX) || !config.accepts_extension(path) {
            debug!("Ignoring {path:?}");
            continue;
        }
        let relative_dir = path
            .parent()
            .and_then(|parent| parent.strip_prefix(folder).ok())
            .map(Path::to_path_buf)
            .with_context(|| format!("Resolving {path:?} relative to {folder:?}"))?;
        files.push(CandidateFile {
            path: path.to_path_buf(),
            file_name,
            relative_dir,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

pub fn is_candidate(file: &CandidateFile, processed: &ProcessedFiles) -> bool {
    !processed.contains(&file.file_name)
}
