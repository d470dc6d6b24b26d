//! Horizons CLI
//!
//! Command-line interface for Horizons - tasks on cascading time horizons,
//! synced across devices through free storage providers.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use horizons_core::sync::SessionStore;
use horizons_core::{Config, FileStore, Horizon, KeyValueStore, Priority, SyncEngine, TaskStore};

mod commands;
mod output;

use commands::task::NewTask;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "horizons")]
#[command(about = "Horizons - tasks on cascading time horizons, synced across devices")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Horizon to file the task under
        #[arg(short = 'H', long, default_value = "days")]
        horizon: Horizon,
        /// Priority (low, medium, high)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Longer description
        #[arg(short, long)]
        description: Option<String>,
        /// Also show the task under these horizons
        #[arg(short, long)]
        cascade: Vec<Horizon>,
    },
    /// List tasks
    #[command(alias = "ls")]
    List {
        /// Only tasks shown under this horizon
        #[arg(short = 'H', long)]
        horizon: Option<Horizon>,
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Show task details
    Show {
        /// Task ID (full ID or prefix)
        id: String,
    },
    /// Mark a task done
    Done {
        /// Task ID (full ID or prefix)
        id: String,
    },
    /// Mark a task not done
    Reopen {
        /// Task ID (full ID or prefix)
        id: String,
    },
    /// Delete a task
    #[command(alias = "delete")]
    Rm {
        /// Task ID (full ID or prefix)
        id: String,
    },
    /// Sync with the cloud (defaults to `sync now`)
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Merge with the remote tasks now
    Now,
    /// Turn sync on, creating a session or joining one
    Enable {
        /// Session code from another device
        #[arg(long, value_name = "CODE")]
        join: Option<String>,
    },
    /// Turn sync off (the session is kept)
    Disable,
    /// Show sync status
    Status,
    /// Keep polling and apply remote changes until Ctrl-C
    Watch,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, sync.primary, sync.poll_interval_secs, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work even when the current config does not load
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    let files = FileStore::open(&config.data_dir).context("Failed to open local storage")?;
    let kv: Arc<dyn KeyValueStore> = Arc::new(files.clone());
    let mut store = TaskStore::open(kv.clone())?;
    if let Some(problem) = store.recovered_from() {
        output.warn(&problem.to_string());
        if let Some(suggestion) = problem.recovery_suggestion() {
            output.warn(suggestion);
        }
    }

    let sessions = SessionStore::new(kv.clone());
    let engine = SyncEngine::from_settings(&config.sync, kv);

    let is_write = matches!(
        &cli.command,
        Commands::Add { .. } | Commands::Done { .. } | Commands::Reopen { .. } | Commands::Rm { .. }
    );

    let result = match cli.command {
        Commands::Add {
            title,
            horizon,
            priority,
            description,
            cascade,
        } => commands::task::add(
            &mut store,
            NewTask {
                title,
                horizon,
                priority,
                description,
                cascade,
            },
            &output,
        ),
        Commands::List { horizon, all } => commands::task::list(&store, horizon, all, &output),
        Commands::Show { id } => commands::task::show(&store, &id, &output),
        Commands::Done { id } => commands::task::done(&mut store, &id, &output),
        Commands::Reopen { id } => commands::task::reopen(&mut store, &id, &output),
        Commands::Rm { id } => commands::task::remove(&mut store, &id, &output),
        Commands::Sync { command } => {
            let context = SyncContext {
                engine: &engine,
                sessions: &sessions,
                files: &files,
                config: &config,
            };
            handle_sync_command(command, &context, &mut store, &output).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    // Push local changes
    if is_write && result.is_ok() {
        commands::sync::auto_sync(&engine, &sessions, &mut store, &output).await;
    }

    result
}

/// What the sync commands need besides the task store
struct SyncContext<'a> {
    engine: &'a SyncEngine,
    sessions: &'a SessionStore,
    files: &'a FileStore,
    config: &'a Config,
}

async fn handle_sync_command(
    command: Option<SyncCommands>,
    context: &SyncContext<'_>,
    store: &mut TaskStore,
    output: &Output,
) -> Result<()> {
    let SyncContext {
        engine,
        sessions,
        files,
        config,
    } = *context;

    match command {
        Some(SyncCommands::Now) | None => commands::sync::now(engine, sessions, store, output).await,
        Some(SyncCommands::Enable { join }) => {
            commands::sync::enable(engine, sessions, store, join, output).await
        }
        Some(SyncCommands::Disable) => commands::sync::disable(sessions, output),
        Some(SyncCommands::Status) => commands::sync::status(sessions, store, files, output),
        Some(SyncCommands::Watch) => {
            commands::sync::watch(
                engine,
                sessions,
                store,
                config.sync.poll_interval_secs,
                output,
            )
            .await
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Install the tracing subscriber
///
/// Logs go to `config.log_file` when set, otherwise to stderr. `RUST_LOG`
/// overrides the level chosen by `--verbose`.
fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("horizons_core={},horizons_cli={}", level, level))
    });

    if let Some(ref log_path) = config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
