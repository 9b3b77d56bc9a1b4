//! Error taxonomy for the ingestion pipeline.
//!
//! Failures are isolated at the narrowest scope that can absorb them:
//!
//! - [`IngestError::TemplateNotFound`] skips a file,
//! - [`IngestError::NoMatchingColumns`] skips a sheet,
//! - a failed additive column change is reported and skipped by the reconciler,
//! - a failed chunk becomes one insertion-error record,
//! - anything else surfaces at the file level as an `anyhow::Error` chain.

use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected statement `{statement}`")]
    Statement {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store connection failed for {target}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store transaction control failed")]
    Transaction(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn statement(sql: &str, source: rusqlite::Error) -> Self {
        StoreError::Statement {
            statement: compact_sql(sql),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no template found for '{name}'")]
    TemplateNotFound { name: String },
    #[error("no incoming column is whitelisted for table '{table}'")]
    NoMatchingColumns { table: String },
    #[error("{kind} name '{name}' is not a valid identifier")]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().join(" ")
}

/// `err` followed by each of its causes, `: `-separated.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
