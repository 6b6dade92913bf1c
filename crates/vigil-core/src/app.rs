//! Application wiring
//!
//! Builds every component once from an [`AppConfig`] and hands out shared handles.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionSigner;
use crate::client::{AuthClient, HttpAuthClient};
use crate::config::AppConfig;
use crate::connectivity::{ConnectivityObserver, TcpProbe};
use crate::db::Database;
use crate::error::Result;
use crate::services::{RegistrationRepository, SyncScheduler, UserSyncTask};
use crate::store::{SqliteUserStore, UserStore};

/// Fully wired application state
pub struct Vigil {
    pub config: AppConfig,
    pub db: Database,
    pub store: Arc<dyn UserStore>,
    pub client: Arc<dyn AuthClient>,
    pub registration: Arc<RegistrationRepository>,
    pub sync_task: Arc<UserSyncTask>,
    pub scheduler: Arc<SyncScheduler>,
    pub connectivity: ConnectivityObserver,
}

impl Vigil {
    pub async fn open(config: AppConfig, connectivity: ConnectivityObserver) -> Result<Self> {
        let client = HttpAuthClient::new(&config.server_url, config.timeout_secs)?;
        Self::open_with_client(config, connectivity, Arc::new(client)).await
    }

    /// Wire everything around a caller-supplied backend client
    pub async fn open_with_client(
        config: AppConfig,
        connectivity: ConnectivityObserver,
        client: Arc<dyn AuthClient>,
    ) -> Result<Self> {
        config.validate()?;

        let db = Database::open(config.resolved_db_path()?).await?;
        let vault = config.vault()?;
        let signer = SessionSigner::new(&vault.session_key());

        let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db.pool.clone()));

        let registration = Arc::new(
            RegistrationRepository::new(
                Arc::clone(&store),
                Arc::clone(&client),
                connectivity.clone(),
                vault.clone(),
                signer,
            )
            .with_bcrypt_cost(config.bcrypt_cost),
        );
        let sync_task = Arc::new(UserSyncTask::new(Arc::clone(&store), Arc::clone(&client), vault));
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&sync_task),
            connectivity.clone(),
            config.sync.clone(),
        ));

        log::info!("Vigil ready, backend at {}", config.server_url);

        Ok(Self {
            config,
            db,
            store,
            client,
            registration,
            sync_task,
            scheduler,
            connectivity,
        })
    }

    /// Reachability probe aimed at the configured backend
    pub fn probe(&self) -> Result<TcpProbe> {
        TcpProbe::from_url(
            &self.config.server_url,
            Duration::from_secs(self.config.timeout_secs.min(5)),
        )
    }
}
