//! Vigil CLI - offline-first account registration
//!
//! Register and log in against the evidence backend, falling back to the local
//! queue when it cannot be reached, and drain that queue once it can.

mod commands;
mod output;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil_core::connectivity::{self, ReachabilityProbe};
use vigil_core::{AppConfig, Vigil};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about = "Offline-first account registration CLI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = output::OutputFormat::Table)]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Config file (or set VIGIL_CONFIG env var)
    #[arg(long, env = "VIGIL_CONFIG", global = true)]
    config: Option<String>,

    /// Override database path (or set VIGIL_DB_PATH env var)
    #[arg(long, env = "VIGIL_DB_PATH", global = true)]
    db: Option<String>,

    /// Override backend URL (or set VIGIL_SERVER_URL env var)
    #[arg(long, env = "VIGIL_SERVER_URL", global = true)]
    server: Option<String>,

    /// Skip the backend entirely and work from the local store
    #[arg(long, global = true)]
    offline: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account (queued locally when the backend is unreachable)
    Register(commands::account::RegisterArgs),

    /// Log in, using cached credentials when the backend is unreachable
    Login(commands::account::LoginArgs),

    /// Show the user a session token belongs to
    Whoami(commands::account::WhoamiArgs),

    /// Sync queued registrations with the backend
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },

    /// Inspect locally stored accounts
    Users {
        #[command(subcommand)]
        action: commands::users::UsersAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_file = match &cli.config {
        Some(path) => PathBuf::from(path),
        None => vigil_core::config::config_path()?,
    };
    let config = load_config(&cli, &config_file)?;

    // Connectivity is decided once per invocation; the daemon keeps probing
    let (handle, observer) = connectivity::channel(false);
    let app = Vigil::open(config, observer)
        .await
        .context("Failed to open the local store")?;

    if !cli.offline {
        let online = match app.probe() {
            Ok(probe) => probe.check().await,
            Err(e) => {
                log::warn!("Cannot probe backend: {}", e);
                false
            }
        };
        handle.set_online(online);
    }

    let ctx = commands::Context {
        app,
        connectivity: handle,
        config_file,
        format: cli.format,
        quiet: cli.quiet,
        offline: cli.offline,
    };

    match cli.command {
        Commands::Register(args) => commands::account::register(&ctx, args).await,
        Commands::Login(args) => commands::account::login(&ctx, args).await,
        Commands::Whoami(args) => commands::account::whoami(&ctx, args).await,
        Commands::Sync { action } => commands::sync::execute(&ctx, action).await,
        Commands::Users { action } => commands::users::execute(&ctx, action).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
    }
}

/// File, then `VIGIL_*` environment, then command-line flags
fn load_config(cli: &Cli, config_file: &std::path::Path) -> Result<AppConfig> {
    let mut config = AppConfig::load_from(config_file)?;
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
