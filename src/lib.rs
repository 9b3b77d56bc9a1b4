pub mod archive;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod discovery;
pub mod error;
pub mod ident;
pub mod io_utils;
pub mod ledger;
pub mod loader;
pub mod normalize;
pub mod reconcile;
pub mod registry;
pub mod routing;
pub mod schema;
pub mod store;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::Cli,
    config::Config,
    coordinator::{Coordinator, RunSummary},
    ledger::bootstrap_system_tables,
    store::SqliteStore,
    workbook::SpreadsheetReader,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;
    let summary = ingest(&config)?;
    summary.print();
    Ok(())
}

/// Runs one ingestion pass with `config` and returns its summary.
///
/// Failing to open the store is the only fatal store condition; everything
/// that goes wrong inside a file is audited and the pass continues.
pub fn ingest(config: &Config) -> Result<RunSummary> {
    config.validate()?;
    let mut store = SqliteStore::open(&config.database)
        .with_context(|| format!("Opening store {:?}", config.database))?;
    if config.bootstrap {
        bootstrap_system_tables(&mut store).context("Creating system tables")?;
    }
    let encoding = io_utils::resolve_encoding(config.input_encoding.as_deref())?;
    let run_started = Local::now().naive_local();
    info!(
        "Starting ingestion run into {:?} (chunk size {})",
        config.database, config.chunk_size
    );
    let summary = Coordinator::new(&mut store, SpreadsheetReader::new(encoding), config, run_started)
        .run()
        .context("Ingestion run aborted")?;
    store.close().context("Closing store")?;
    info!(
        "Run complete: {} loaded, {} skipped, {} failed, {} row(s) inserted",
        summary.files_loaded(),
        summary.files_skipped(),
        summary.files_failed(),
        summary.rows_inserted()
    );
    Ok(summary)
}
