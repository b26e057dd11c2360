mod utils;

pub mod brew_session;
pub mod cli;
pub mod commands;
pub mod db;
pub mod entries;
pub mod form;
pub mod models;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod timer;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use cli::{Cli, Commands};
use db::Database;
use entries::{EntryRepository, EntryStore};
use settings::SettingsStore;
use storage::{KeyValueStorage, MemoryStorage};

const ENABLE_LOGS: bool = true;

const DATABASE_FILE: &str = "brewlog.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

pub fn run() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run_cli(cli))
}

async fn run_cli(cli: Cli) -> Result<()> {
    let data_dir = cli.resolved_data_dir();
    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

    if cli.ephemeral {
        log_info!("Using in-memory storage; no entries will be saved");
        return dispatch(MemoryStorage::new(), cli.command, &settings).await;
    }

    let database = Database::new(data_dir.join(DATABASE_FILE))?;
    log_info!("Opened journal at {}", database.path().display());
    dispatch(database, cli.command, &settings).await
}

async fn dispatch<S: KeyValueStorage>(
    storage: S,
    command: Commands,
    settings: &SettingsStore,
) -> Result<()> {
    let repo = EntryRepository::new(EntryStore::new(storage));
    repo.load().await;

    let mut stdout = std::io::stdout();
    commands::execute(command, &repo, settings, Utc::now(), &mut stdout).await
}
