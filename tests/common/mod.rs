#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sheet_loader::config::Config;
use sheet_loader::data::Value;
use sheet_loader::discovery::register_source_folder;
use sheet_loader::ledger::bootstrap_system_tables;
use sheet_loader::store::{SqliteStore, Store};
use tempfile::{TempDir, tempdir};

/// Scratch directory holding a store, source folders and the processed tree.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` under the workspace, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("loader.db")
    }

    pub fn output_root(&self) -> PathBuf {
        self.path().join("processed")
    }

    /// Defaults pointed at this workspace, accepting delimited text too.
    pub fn config(&self) -> Config {
        Config {
            database: self.database(),
            output_root: self.output_root(),
            extensions: vec!["xlsx".into(), "csv".into()],
            ..Config::default()
        }
    }

    /// Opens the workspace store with system tables in place.
    pub fn store(&self) -> SqliteStore {
        let mut store = SqliteStore::open(&self.database()).expect("open store");
        bootstrap_system_tables(&mut store).expect("bootstrap");
        store
    }

    /// Creates `template` with the given active columns plus one ignored row.
    pub fn seed_template(&self, template: &str, columns: &[&str]) {
        let mut store = self.store();
        store
            .execute(
                &format!("CREATE TABLE IF NOT EXISTS \"{template}\" (Columns TEXT, status TEXT)"),
                &[],
            )
            .expect("create template");
        for column in columns {
            store
                .execute(
                    &format!("INSERT INTO \"{template}\" (Columns, status) VALUES (?1, 'Use')"),
                    &[Some(Value::String(column.to_string()))],
                )
                .expect("insert template column");
        }
        store
            .execute(
                &format!("INSERT INTO \"{template}\" (Columns, status) VALUES ('Retired', 'Ignore')"),
                &[],
            )
            .expect("insert ignored column");
        store.close().expect("close store");
    }

    /// Creates a source directory and registers it under `category`.
    pub fn source_folder(&self, name: &str, category: &str) -> PathBuf {
        let folder = self.path().join(name);
        fs::create_dir_all(&folder).expect("create source folder");
        let mut store = self.store();
        register_source_folder(&mut store, &folder, category).expect("register folder");
        store.close().expect("close store");
        folder
    }

    pub fn query(&self, sql: &str) -> Vec<Vec<Option<Value>>> {
        let mut store = self.store();
        let rows = store.fetch_all(sql, &[]).expect("query");
        store.close().expect("close store");
        rows
    }

    /// Every file currently under the processed tree, relative to its root.
    pub fn archived_files(&self) -> Vec<PathBuf> {
        let root = self.output_root();
        let mut files = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let path = entry.expect("dir entry").path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path.strip_prefix(&root).expect("under root").to_path_buf());
                }
            }
        }
        files.sort();
        files
    }
}

pub fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

pub fn int(value: i64) -> Option<Value> {
    Some(Value::Integer(value))
}
