use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage::{self, KvStore, MemoryStore};

pub mod commands;

use self::commands::{AgendaArgs, BlockArgs, TodoArgs, TuiArgs};

#[derive(Parser, Debug)]
#[command(
    name = "taskflow",
    version,
    about = "Terminal task list and time-block calendar"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over TASKFLOW_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over TASKFLOW_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Keep everything in memory; nothing is written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui(TuiArgs),
    /// Manage the task list
    Todo(TodoArgs),
    /// Manage calendar time blocks
    Block(BlockArgs),
    /// Print the occupied calendar slots for a day, week or month
    Agenda(AgendaArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Tui(TuiArgs::default()));
    let log_target = match command {
        Commands::Tui(_) => LogTarget::File(paths.log_file()),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, &log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    let store: Arc<dyn KvStore> = if cli.ephemeral {
        tracing::info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(storage::init(&paths, &config.storage)?)
    };

    match command {
        Commands::Tui(args) => commands::run_tui(config, store, args),
        Commands::Todo(args) => commands::handle_todo_command(store.as_ref(), args),
        Commands::Block(args) => commands::handle_block_command(&config, store.as_ref(), args),
        Commands::Agenda(args) => commands::print_agenda(store.as_ref(), args),
    }
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogTarget::File(path) => {
                let file = open_log_file(path)?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
