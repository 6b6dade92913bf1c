//! Account commands
//!
//! register / login / whoami on top of the registration repository.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_json, print_output, print_pending, print_success, FieldRow, OutputFormat};
use vigil_core::{AuthOutcome, LoginRequest, RegisterRequest, Session};

#[derive(Args)]
pub struct RegisterArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password (or set VIGIL_PASSWORD env var)
    #[arg(long, env = "VIGIL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password (or set VIGIL_PASSWORD env var)
    #[arg(long, env = "VIGIL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct WhoamiArgs {
    /// Session token from `vigil login` (or set VIGIL_TOKEN env var)
    #[arg(long, env = "VIGIL_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Session row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SessionRow {
    #[tabled(rename = "Email")]
    pub email: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Mode")]
    pub mode: String,
    #[tabled(rename = "Synced")]
    pub synced: String,
    #[tabled(rename = "Token")]
    pub token: String,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            email: session.user.email.clone(),
            name: session.user.name.clone(),
            mode: if session.offline { "offline" } else { "online" }.to_string(),
            synced: if session.user.is_synced { "yes" } else { "pending" }.to_string(),
            token: session.access_token.clone(),
        }
    }
}

pub async fn register(ctx: &Context, args: RegisterArgs) -> Result<()> {
    let outcome = ctx
        .app
        .registration
        .register(RegisterRequest {
            name: args.name,
            email: args.email,
            password: args.password,
        })
        .await?;

    print_outcome(ctx, &outcome)
}

pub async fn login(ctx: &Context, args: LoginArgs) -> Result<()> {
    let outcome = ctx
        .app
        .registration
        .login(LoginRequest {
            email: args.email,
            password: args.password,
        })
        .await?;

    print_outcome(ctx, &outcome)
}

pub async fn whoami(ctx: &Context, args: WhoamiArgs) -> Result<()> {
    let user = ctx.app.registration.current_user(&args.token).await?;

    match ctx.format {
        OutputFormat::Json => print_json(&user),
        OutputFormat::Table => {
            let rows = vec![
                FieldRow::new("ID", &user.id),
                FieldRow::new("Email", &user.email),
                FieldRow::new("Name", &user.name),
                FieldRow::new("Synced", user.is_synced),
                FieldRow::new("Server ID", user.server_id.as_deref().unwrap_or("-")),
            ];
            print_output(&rows, ctx.format)
        }
    }
}

fn print_outcome(ctx: &Context, outcome: &AuthOutcome) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        return print_json(outcome);
    }

    match outcome {
        AuthOutcome::Queued { local_id, message } => {
            print_pending(message, ctx.quiet);
            print_pending(&format!("Local ID: {}", local_id), ctx.quiet);
        }
        AuthOutcome::PendingVerification { message } => {
            print_success(message, ctx.quiet);
        }
        AuthOutcome::LoggedIn(session) => {
            if session.offline {
                print_pending("Logged in with cached credentials (offline)", ctx.quiet);
            } else {
                print_success("Logged in", ctx.quiet);
            }
            print_output(&[SessionRow::from(session)], ctx.format)?;
        }
    }
    Ok(())
}
