//! Processed-output tree and file moves.
//!
//! Layout: `<output_root>/Processed_<YYYY-MM-DD_HH->_<table>/<relative dir>/<file>`,
//! where the timestamp is the run start truncated to the hour.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, info};

const FOLDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-";

#[derive(Debug, Clone)]
pub struct Archiver {
    output_root: PathBuf,
    run_started: NaiveDateTime,
}

impl Archiver {
    pub fn new(output_root: impl Into<PathBuf>, run_started: NaiveDateTime) -> Self {
        Self {
            output_root: output_root.into(),
            run_started,
        }
    }

    pub fn processed_folder(&self, table: &str) -> PathBuf {
        self.output_root.join(format!(
            "Processed_{}_{table}",
            self.run_started.format(FOLDER_TIMESTAMP_FORMAT)
        ))
    }

    /// Moves `source` under the table's processed folder, mirroring
    /// `relative_dir`, and returns the new location.
    pub fn archive(&self, source: &Path, relative_dir: &Path, table: &str) -> Result<PathBuf> {
        let target_dir = self.processed_folder(table).join(relative_dir);
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("Creating processed folder {target_dir:?}"))?;
        let file_name = source
            .file_name()
            .with_context(|| format!("Archiving {source:?}: path has no file name"))?;
        let target = target_dir.join(file_name);
        move_file(source, &target)
            .with_context(|| format!("Moving {source:?} to {target:?}"))?;
        info!("File '{}' processed and moved to {target_dir:?}", file_name.to_string_lossy());
        Ok(target)
    }
}

/// Rename, falling back to copy and remove when the rename is refused
/// (e.g. across filesystems).
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!("Rename of {source:?} failed ({err}); copying instead");
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
    }
}
