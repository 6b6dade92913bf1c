//! User commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{or_dash, print_output};
use vigil_core::User;

#[derive(Subcommand)]
pub enum UsersAction {
    /// List locally stored accounts
    List {
        /// Only registrations still waiting for the backend
        #[arg(long)]
        pending: bool,
    },
}

/// User row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct UserRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Email")]
    pub email: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Server ID")]
    pub server_id: String,
    #[tabled(rename = "Attempts")]
    pub attempts: i64,
    #[tabled(rename = "Last Error")]
    pub last_error: String,
    #[tabled(rename = "Created")]
    pub created_at: String,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            status: if user.is_synced { "synced" } else { "pending" }.to_string(),
            server_id: or_dash(user.server_id.as_deref()),
            attempts: user.sync_attempts,
            last_error: or_dash(user.last_sync_error.as_deref()),
            created_at: user.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: UsersAction) -> Result<()> {
    match action {
        UsersAction::List { pending } => list_users(ctx, pending).await,
    }
}

async fn list_users(ctx: &Context, pending: bool) -> Result<()> {
    let users = if pending {
        ctx.app.store.list_unsynced().await?
    } else {
        ctx.app.store.list_all().await?
    };

    let rows: Vec<UserRow> = users.into_iter().map(UserRow::from).collect();
    print_output(&rows, ctx.format)
}
