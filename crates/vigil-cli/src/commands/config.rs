//! Config commands
//!
//! Show the effective configuration after file, environment and flag overrides.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_json, print_output, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the config file location
    Path,
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl ConfigRow {
    fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
        ConfigAction::Path => {
            println!("{}", ctx.config_file.display());
            Ok(())
        }
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.app.config;

    if ctx.format == OutputFormat::Json {
        return print_json(config);
    }

    let config_file = if ctx.config_file.exists() {
        ctx.config_file.display().to_string()
    } else {
        format!("{} (not found, using defaults)", ctx.config_file.display())
    };
    let key_source = match config.secret_key {
        Some(_) => "VIGIL_SECRET_KEY".to_string(),
        None => config.resolved_key_path()?.display().to_string(),
    };

    let rows = vec![
        ConfigRow::new("config_file", config_file),
        ConfigRow::new("server_url", &config.server_url),
        ConfigRow::new("timeout_secs", config.timeout_secs),
        ConfigRow::new("probe_interval_secs", config.probe_interval_secs),
        ConfigRow::new("db_path", config.resolved_db_path()?.display()),
        ConfigRow::new("secret_key", key_source),
        ConfigRow::new("bcrypt_cost", config.bcrypt_cost),
        ConfigRow::new("sync.enabled", config.sync.enabled),
        ConfigRow::new("sync.interval_minutes", config.sync.interval_minutes),
        ConfigRow::new("sync.sync_on_reconnect", config.sync.sync_on_reconnect),
    ];
    print_output(&rows, ctx.format)
}
