//! Sync Scheduler
//!
//! Runs the background sync task on a fixed interval while the app is up, and
//! immediately after connectivity comes back. Ticks that land while offline are skipped.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

use super::background_sync::{SyncOutcome, SyncReport, UserSyncTask};
use crate::config::SyncSettings;
use crate::connectivity::ConnectivityObserver;

// =============================================================================
// Status
// =============================================================================

/// Current status of the scheduler
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    /// Whether the scheduling loop is running
    pub is_running: bool,
    /// Whether a sync run is in progress
    pub is_syncing: bool,
    /// Last run timestamp (RFC 3339)
    pub last_run_at: Option<String>,
    /// Next scheduled run (RFC 3339)
    pub next_run_at: Option<String>,
    pub last_outcome: Option<SyncOutcome>,
    pub last_result: Option<String>,
    pub last_error: Option<String>,
    /// Registrations still queued
    pub pending: i64,
}

// =============================================================================
// Scheduler
// =============================================================================

struct RunningLoop {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives [`UserSyncTask`] on a schedule
pub struct SyncScheduler {
    settings: Arc<RwLock<SyncSettings>>,
    status: Arc<RwLock<SchedulerStatus>>,
    running: Mutex<Option<RunningLoop>>,
    /// Serializes runs between the loop and manual triggers
    run_lock: Arc<Mutex<()>>,
    task: Arc<UserSyncTask>,
    connectivity: ConnectivityObserver,
    period: Option<Duration>,
}

impl SyncScheduler {
    pub fn new(task: Arc<UserSyncTask>, connectivity: ConnectivityObserver, settings: SyncSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            running: Mutex::new(None),
            run_lock: Arc::new(Mutex::new(())),
            task,
            connectivity,
            period: None,
        }
    }

    /// Override the tick period (sub-minute intervals)
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    pub async fn settings(&self) -> SyncSettings {
        self.settings.read().await.clone()
    }

    /// Replace the settings, restarting or stopping the loop as needed
    pub async fn update_settings(&self, new_settings: SyncSettings) {
        let old = {
            let mut settings = self.settings.write().await;
            std::mem::replace(&mut *settings, new_settings.clone())
        };

        if new_settings.enabled && old != new_settings {
            self.restart().await;
        } else if !new_settings.enabled && old.enabled {
            self.stop().await;
        }
    }

    /// Snapshot of the current status, with a fresh pending count
    pub async fn status(&self) -> SchedulerStatus {
        let pending = self.task.pending().await;
        let mut status = self.status.read().await.clone();
        match pending {
            Ok(count) => status.pending = count,
            Err(e) => log::warn!("Could not count queued registrations: {}", e),
        }
        status
    }

    pub async fn start(&self) {
        let settings = self.settings.read().await.clone();
        if !settings.enabled {
            log::info!("Background sync is disabled, not starting");
            return;
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            log::info!("Sync scheduler is already running");
            return;
        }

        let period = self
            .period
            .unwrap_or_else(|| Duration::from_secs(u64::from(settings.interval_minutes) * 60));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        {
            let mut status = self.status.write().await;
            status.is_running = true;
            status.next_run_at = Some(next_run(period));
        }

        log::info!("Starting sync scheduler with {:?} interval", period);

        let settings_ref = Arc::clone(&self.settings);
        let status = Arc::clone(&self.status);
        let run_lock = Arc::clone(&self.run_lock);
        let task = Arc::clone(&self.task);
        let mut connectivity = self.connectivity.clone();
        // Only transitions after start count as reconnects
        connectivity.mark_seen();
        let mut watching = settings.sync_on_reconnect;

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);

            // Skip the first tick (immediate)
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if !settings_ref.read().await.enabled {
                            log::info!("Background sync disabled, stopping loop");
                            break;
                        }
                        if connectivity.is_online() {
                            Self::perform_sync(&task, &status, &run_lock).await;
                        } else {
                            log::debug!("Offline, skipping scheduled sync");
                        }
                        status.write().await.next_run_at = Some(next_run(period));
                    }
                    change = connectivity.changed(), if watching => {
                        match change {
                            Some(true) => {
                                log::info!("Connectivity restored, syncing queued registrations");
                                Self::perform_sync(&task, &status, &run_lock).await;
                            }
                            Some(false) => {}
                            // Fixed signal; nothing will ever change
                            None => watching = false,
                        }
                    }
                    _ = &mut shutdown_rx => {
                        log::info!("Sync scheduler received shutdown signal");
                        break;
                    }
                }
            }

            let mut st = status.write().await;
            st.is_running = false;
            st.next_run_at = None;
            log::info!("Sync scheduler stopped");
        });

        *running = Some(RunningLoop { shutdown_tx, handle });
    }

    /// Stop the loop and wait for it to exit. An in-flight run finishes first.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        let _ = running.shutdown_tx.send(());
        if let Err(e) = running.handle.await {
            log::warn!("Sync scheduler loop ended abnormally: {}", e);
        }

        let mut status = self.status.write().await;
        status.is_running = false;
        status.next_run_at = None;
    }

    pub async fn restart(&self) {
        self.stop().await;
        self.start().await;
    }

    /// Run a sync now, regardless of the schedule
    pub async fn trigger(&self) -> SyncReport {
        Self::perform_sync(&self.task, &self.status, &self.run_lock).await
    }

    async fn perform_sync(
        task: &UserSyncTask,
        status: &RwLock<SchedulerStatus>,
        run_lock: &Mutex<()>,
    ) -> SyncReport {
        let _guard = run_lock.lock().await;

        status.write().await.is_syncing = true;

        let report = task.run().await;

        let mut st = status.write().await;
        st.is_syncing = false;
        st.last_run_at = Some(Utc::now().to_rfc3339());
        st.last_outcome = Some(report.outcome);
        st.last_result = Some(report.summary());
        st.last_error = if report.failures.is_empty() {
            None
        } else {
            Some(
                report
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.email, f.error))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        report
    }
}

fn next_run(period: Duration) -> String {
    let period = chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::zero());
    (Utc::now() + period).to_rfc3339()
}
