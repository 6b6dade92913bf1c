//! Background sync task
//!
//! Drains queued registrations: every unsynced row is replayed against the register
//! endpoint and marked synced once the backend hands back a user id. The task is
//! state-driven, so rerunning it never replays a row twice.

use serde::Serialize;
use std::sync::Arc;

use crate::auth::SecretVault;
use crate::client::AuthClient;
use crate::error::{Error, Result};
use crate::models::{RegisterRequest, User};
use crate::store::UserStore;

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing left in the queue
    Success,
    /// At least one row is still unsynced; run again later
    Retry,
}

/// A row that failed to sync in this run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub local_id: String,
    pub email: String,
    pub error: String,
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub attempted: usize,
    pub synced: usize,
    pub failures: Vec<RecordFailure>,
}

impl SyncReport {
    fn empty(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            attempted: 0,
            synced: 0,
            failures: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        match self.outcome {
            SyncOutcome::Success if self.attempted == 0 => "Nothing to sync".to_string(),
            SyncOutcome::Success => format!("Synced {} registration(s)", self.synced),
            SyncOutcome::Retry => format!(
                "Synced {} of {} registration(s), {} will be retried",
                self.synced,
                self.attempted,
                self.attempted.saturating_sub(self.synced)
            ),
        }
    }
}

/// Replays unsynced registrations against the backend
pub struct UserSyncTask {
    store: Arc<dyn UserStore>,
    client: Arc<dyn AuthClient>,
    vault: SecretVault,
}

impl UserSyncTask {
    pub fn new(store: Arc<dyn UserStore>, client: Arc<dyn AuthClient>, vault: SecretVault) -> Self {
        Self {
            store,
            client,
            vault,
        }
    }

    /// Number of registrations still queued
    pub async fn pending(&self) -> Result<i64> {
        self.store.count_unsynced().await
    }

    pub async fn run(&self) -> SyncReport {
        let pending = match self.store.list_unsynced().await {
            Ok(pending) => pending,
            Err(e) => {
                log::error!("Could not read queued registrations: {}", e);
                return SyncReport::empty(SyncOutcome::Retry);
            }
        };

        if pending.is_empty() {
            log::debug!("No queued registrations");
            return SyncReport::empty(SyncOutcome::Success);
        }

        log::info!("Syncing {} queued registration(s)", pending.len());

        let mut report = SyncReport::empty(SyncOutcome::Success);
        for user in &pending {
            report.attempted += 1;
            match self.sync_one(user).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    let error = e.to_string();
                    log::warn!("Sync failed for {}: {}", user.id, error);
                    if let Err(e) = self.store.record_sync_failure(&user.id, &error).await {
                        log::warn!("Could not record sync failure for {}: {}", user.id, e);
                    }
                    report.failures.push(RecordFailure {
                        local_id: user.id.clone(),
                        email: user.email.clone(),
                        error,
                    });
                }
            }
        }

        if !report.failures.is_empty() {
            report.outcome = SyncOutcome::Retry;
        }
        log::info!("Sync finished: {}", report.summary());
        report
    }

    async fn sync_one(&self, user: &User) -> Result<()> {
        let sealed = user
            .sealed_password
            .as_deref()
            .ok_or_else(|| Error::crypto("No sealed password stored for this registration"))?;
        let password = self.vault.open(sealed)?;

        let response = self
            .client
            .register(&RegisterRequest {
                name: user.name.clone(),
                email: user.email.clone(),
                password,
            })
            .await?;

        if !response.status {
            return Err(Error::Rejected(response.message));
        }

        let remote = response
            .user
            .ok_or_else(|| Error::internal("Registration accepted without a user id"))?;

        if self.store.mark_synced(&user.id, &remote.id).await? {
            log::info!("Registration {} synced as {}", user.id, remote.id);
        } else {
            log::debug!("Registration {} was already synced", user.id);
        }
        Ok(())
    }
}
