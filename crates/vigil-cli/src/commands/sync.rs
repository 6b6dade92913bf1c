//! Sync commands
//!
//! Replay queued registrations against the backend, once or on a schedule.

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use super::Context;
use crate::output::{
    or_dash, print_info, print_json, print_output, print_pending, print_success, FieldRow,
    OutputFormat,
};
use vigil_core::connectivity::spawn_probe;
use vigil_core::{SchedulerStatus, SyncOutcome, SyncReport, SyncSettings};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Sync queued registrations now
    Run,

    /// Show queue and scheduler status
    Status,

    /// Keep syncing on a schedule until interrupted
    Daemon {
        /// Sync interval in minutes (overrides config)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        interval: Option<u32>,
    },
}

/// Failed record row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct FailureRow {
    #[tabled(rename = "Email")]
    pub email: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

#[derive(Serialize)]
struct StatusView<'a> {
    server_url: &'a str,
    online: bool,
    settings: SyncSettings,
    scheduler: SchedulerStatus,
}

pub async fn execute(ctx: &Context, action: SyncAction) -> Result<()> {
    match action {
        SyncAction::Run => run_sync(ctx).await,
        SyncAction::Status => show_status(ctx).await,
        SyncAction::Daemon { interval } => run_daemon(ctx, interval).await,
    }
}

async fn run_sync(ctx: &Context) -> Result<()> {
    if !ctx.app.connectivity.is_online() {
        let pending = ctx.app.sync_task.pending().await?;
        print_pending(
            &format!("Backend unreachable, {} registration(s) still queued", pending),
            ctx.quiet,
        );
        return Ok(());
    }

    print_info("Syncing queued registrations...", ctx.quiet);
    let report = ctx.app.scheduler.trigger().await;
    print_report(ctx, &report)
}

async fn show_status(ctx: &Context) -> Result<()> {
    let view = StatusView {
        server_url: &ctx.app.config.server_url,
        online: ctx.app.connectivity.is_online(),
        settings: ctx.app.scheduler.settings().await,
        scheduler: ctx.app.scheduler.status().await,
    };

    if ctx.format == OutputFormat::Json {
        return print_json(&view);
    }

    let rows = vec![
        FieldRow::new("Backend", view.server_url),
        FieldRow::new("Online", view.online),
        FieldRow::new("Pending registrations", view.scheduler.pending),
        FieldRow::new("Background sync", if view.settings.enabled { "enabled" } else { "disabled" }),
        FieldRow::new("Interval", format!("{} min", view.settings.interval_minutes)),
        FieldRow::new("Sync on reconnect", view.settings.sync_on_reconnect),
    ];
    print_output(&rows, ctx.format)
}

async fn run_daemon(ctx: &Context, interval: Option<u32>) -> Result<()> {
    let scheduler = &ctx.app.scheduler;

    let mut settings = scheduler.settings().await;
    if let Some(minutes) = interval {
        settings.interval_minutes = minutes;
    }
    if !settings.enabled {
        bail!("Background sync is disabled in the configuration");
    }
    scheduler.update_settings(settings.clone()).await;
    scheduler.start().await;

    let probe = if ctx.offline {
        None
    } else {
        Some(spawn_probe(
            ctx.connectivity.clone(),
            Arc::new(ctx.app.probe()?),
            Duration::from_secs(ctx.app.config.probe_interval_secs),
        ))
    };

    print_info(
        &format!(
            "Syncing every {} min{}. Press Ctrl+C to stop.",
            settings.interval_minutes,
            if ctx.offline { " (offline, nothing will be sent)" } else { "" }
        ),
        ctx.quiet,
    );

    if ctx.app.connectivity.is_online() {
        let report = scheduler.trigger().await;
        print_report(ctx, &report)?;
    }

    tokio::signal::ctrl_c().await?;
    print_info("Stopping...", ctx.quiet);

    scheduler.stop().await;
    if let Some(probe) = probe {
        probe.abort();
    }
    Ok(())
}

fn print_report(ctx: &Context, report: &SyncReport) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        return print_json(report);
    }

    match report.outcome {
        SyncOutcome::Success => print_success(&report.summary(), ctx.quiet),
        SyncOutcome::Retry => print_pending(&report.summary(), ctx.quiet),
    }

    if !report.failures.is_empty() {
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                email: f.email.clone(),
                error: or_dash(Some(f.error.as_str()).filter(|e| !e.is_empty())),
            })
            .collect();
        print_output(&rows, ctx.format)?;
    }
    Ok(())
}
