//! Run configuration.
//!
//! Loaded from an optional YAML file; every key has a default so an absent
//! file yields a working configuration:
//!
//! ```yaml
//! database: sheet-loader.db
//! output_root: processed
//! extensions: [xlsx]
//! chunk_size: 1000
//! category_templates:
//!   - { keyword: Sauce3, template: Sauce3Template }
//! special_keywords: [Probate, Tax, Eviction]
//! ```

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{loader::DEFAULT_CHUNK_SIZE, routing::CategoryTemplate};

pub const DEFAULT_CONFIG_FILE: &str = "sheet-loader.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: PathBuf,
    pub output_root: PathBuf,
    pub extensions: Vec<String>,
    pub chunk_size: usize,
    pub category_templates: Vec<CategoryTemplate>,
    pub special_keywords: Vec<String>,
    /// Encoding label for delimited-text inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
    pub bootstrap: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sheet-loader.db"),
            output_root: PathBuf::from("processed"),
            extensions: vec!["xlsx".to_string()],
            chunk_size: DEFAULT_CHUNK_SIZE,
            category_templates: vec![
                CategoryTemplate::new("Sauce3", "Sauce3Template"),
                CategoryTemplate::new("Sauce1", "Sauce1Template"),
                CategoryTemplate::new("Sauce2", "Sauce2Template"),
            ],
            special_keywords: vec![
                "Probate".to_string(),
                "Tax".to_string(),
                "Eviction".to_string(),
            ],
            input_encoding: None,
            bootstrap: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` when given. Otherwise the default file is used if it
    /// exists, falling back to built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.chunk_size > 0, "chunk_size must be greater than zero");
        ensure!(
            !self.extensions.is_empty(),
            "at least one spreadsheet extension must be configured"
        );
        for mapping in &self.category_templates {
            ensure!(
                !mapping.keyword.trim().is_empty(),
                "category template keywords must not be empty"
            );
        }
        Ok(())
    }

    /// Case-insensitive extension match, ignoring a leading dot in the config.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database: /tmp/loader.db").unwrap();
        writeln!(file, "extensions: [xlsx, .CSV]").unwrap();
        let config = Config::load(file.path()).expect("load config");
        assert_eq!(config.database, PathBuf::from("/tmp/loader.db"));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.special_keywords, vec!["Probate", "Tax", "Eviction"]);
        assert!(config.accepts_extension(Path::new("a.csv")));
        assert!(config.accepts_extension(Path::new("b.XLSX")));
        assert!(!config.accepts_extension(Path::new("c.xls")));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chunk_size: 0").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("chunk_size"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chunk: 5").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::resolve(Some(Path::new("does-not-exist.yaml"))).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.yaml"));
    }
}
