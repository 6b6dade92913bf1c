//! Registration repository
//!
//! Decides between the online and offline paths for register/login. Connectivity is
//! read once at the start of an attempt. Transport faults never reach the caller:
//! registration falls back to the offline queue, login falls back to cached credentials.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{hash_password_with_cost, verify_password, SecretVault, SessionSigner};
use crate::client::AuthClient;
use crate::connectivity::ConnectivityObserver;
use crate::error::{Error, Result};
use crate::models::{
    AuthOutcome, AuthResponse, LoginRequest, NewUser, RegisterRequest, SyncedUser, User,
    UserResponse,
};
use crate::store::UserStore;

const QUEUED_MESSAGE: &str =
    "Registration saved on this device. It will be completed once the connection returns.";
const PENDING_MESSAGE: &str = "Registration submitted. Please verify your account.";

/// Orchestrates online vs. offline registration and login
pub struct RegistrationRepository {
    store: Arc<dyn UserStore>,
    client: Arc<dyn AuthClient>,
    connectivity: ConnectivityObserver,
    vault: SecretVault,
    signer: SessionSigner,
    bcrypt_cost: u32,
}

impl RegistrationRepository {
    pub fn new(
        store: Arc<dyn UserStore>,
        client: Arc<dyn AuthClient>,
        connectivity: ConnectivityObserver,
        vault: SecretVault,
        signer: SessionSigner,
    ) -> Self {
        Self {
            store,
            client,
            connectivity,
            vault,
            signer,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Register online, or queue the registration locally when the backend is unreachable
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthOutcome> {
        let request = normalize_registration(request)?;

        if !self.connectivity.is_online() {
            log::info!("Offline, queueing registration locally");
            return self.queue_registration(&request).await;
        }

        match self.client.register(&request).await {
            Ok(response) if response.status => self.accept_registration(&request, response).await,
            Ok(response) => {
                log::info!("Registration rejected by server");
                Err(Error::Rejected(response.message))
            }
            Err(e) if e.is_transport() => {
                log::warn!("Registration could not reach the server, queueing: {}", e);
                self.queue_registration(&request).await
            }
            Err(e) => Err(e),
        }
    }

    /// Log in online, falling back to cached credentials when the backend is unreachable
    pub async fn login(&self, request: LoginRequest) -> Result<AuthOutcome> {
        let request = normalize_login(request)?;

        if self.connectivity.is_online() {
            match self.client.login(&request).await {
                Ok(response) if response.status => {
                    return self.complete_online_login(&request, response).await;
                }
                Ok(response) => return Err(Error::Rejected(response.message)),
                Err(e) if e.is_transport() => {
                    log::warn!("Login could not reach the server, trying offline credentials: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        self.offline_login(&request).await
    }

    /// Resolve a session token back to its user
    pub async fn current_user(&self, token: &str) -> Result<UserResponse> {
        let claims = self.signer.verify_token(token)?;

        let user = self
            .store
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| Error::not_found("User not found"))?;

        Ok(UserResponse::from(user))
    }

    /// Registrations still waiting for the backend
    pub async fn pending_registrations(&self) -> Result<Vec<UserResponse>> {
        let pending = self.store.list_unsynced().await?;
        Ok(pending.into_iter().map(UserResponse::from).collect())
    }

    async fn queue_registration(&self, request: &RegisterRequest) -> Result<AuthOutcome> {
        let existing = self.store.find_by_email(&request.email).await?;
        if existing.as_ref().is_some_and(|user| user.is_synced) {
            return Err(Error::rejected("Email already registered"));
        }

        let password_hash = hash_blocking(&request.password, self.bcrypt_cost).await?;
        let sealed_password = self.vault.seal(&request.password)?;

        let local_id = match existing {
            Some(existing) => {
                log::info!("Replacing queued registration {}", existing.id);
                self.store
                    .update_pending(&existing.id, &request.name, &password_hash, &sealed_password)
                    .await?;
                existing.id
            }
            None => {
                let user = self
                    .store
                    .insert(NewUser {
                        id: Uuid::new_v4().to_string(),
                        email: request.email.clone(),
                        name: request.name.clone(),
                        password_hash,
                        sealed_password: Some(sealed_password),
                    })
                    .await?;
                log::info!("Queued registration {}", user.id);
                user.id
            }
        };

        Ok(AuthOutcome::Queued {
            local_id,
            message: QUEUED_MESSAGE.to_string(),
        })
    }

    /// The backend accepted the registration; the account still needs verification.
    async fn accept_registration(
        &self,
        request: &RegisterRequest,
        response: AuthResponse,
    ) -> Result<AuthOutcome> {
        // A row queued earlier for the same email would otherwise be replayed
        // by the sync task and bounce as a duplicate. The cached credentials must
        // follow the account the backend just created.
        if let Some(remote) = &response.user {
            let queued = self.store.find_by_email(&request.email).await?;
            if let Some(queued) = queued.filter(|user| !user.is_synced) {
                let password_hash = hash_blocking(&request.password, self.bcrypt_cost).await?;
                self.store
                    .upsert_synced(SyncedUser {
                        server_id: remote.id.clone(),
                        email: request.email.clone(),
                        name: request.name.clone(),
                        password_hash,
                    })
                    .await?;
                log::info!("Queued registration {} confirmed online", queued.id);
            }
        }

        let message = if response.message.is_empty() {
            PENDING_MESSAGE.to_string()
        } else {
            response.message
        };
        Ok(AuthOutcome::PendingVerification { message })
    }

    async fn complete_online_login(
        &self,
        request: &LoginRequest,
        response: AuthResponse,
    ) -> Result<AuthOutcome> {
        let existing = self.store.find_by_email(&request.email).await?;

        let Some(remote) = response.user else {
            // Credentials were accepted but there is nothing to reconcile against
            let user = existing
                .ok_or_else(|| Error::internal("Login response did not include a user"))?;
            return Ok(AuthOutcome::LoggedIn(self.signer.issue(user, false)?));
        };

        let name = if !remote.name.trim().is_empty() {
            remote.name
        } else if let Some(user) = &existing {
            user.name.clone()
        } else {
            default_name(&request.email)
        };

        let password_hash = hash_blocking(&request.password, self.bcrypt_cost).await?;
        let user = self
            .store
            .upsert_synced(SyncedUser {
                server_id: remote.id,
                email: request.email.clone(),
                name,
                password_hash,
            })
            .await?;

        log::info!("Online login for {}, cached credentials refreshed", user.id);
        Ok(AuthOutcome::LoggedIn(self.signer.issue(user, false)?))
    }

    async fn offline_login(&self, request: &LoginRequest) -> Result<AuthOutcome> {
        let user = self
            .store
            .find_by_email(&request.email)
            .await?
            .ok_or(Error::InvalidOfflineCredentials)?;

        if !verify_blocking(&request.password, &user).await {
            return Err(Error::InvalidOfflineCredentials);
        }

        log::info!("Offline login for {}", user.id);
        Ok(AuthOutcome::LoggedIn(self.signer.issue(user, true)?))
    }
}

fn normalize_registration(request: RegisterRequest) -> Result<RegisterRequest> {
    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email)?;

    if name.is_empty() {
        return Err(Error::validation("Name is required"));
    }
    if request.password.is_empty() {
        return Err(Error::validation("Password is required"));
    }

    Ok(RegisterRequest {
        name,
        email,
        password: request.password,
    })
}

fn normalize_login(request: LoginRequest) -> Result<LoginRequest> {
    let email = normalize_email(&request.email)?;
    if request.password.is_empty() {
        return Err(Error::validation("Password is required"));
    }
    Ok(LoginRequest {
        email,
        password: request.password,
    })
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(Error::validation("Email is required"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::validation(format!("Invalid email address: {}", email))),
    }
}

fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// bcrypt is CPU-bound; keep it off the async workers
async fn hash_blocking(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_with_cost(&password, cost))
        .await
        .map_err(|e| Error::internal(format!("Hashing task failed: {}", e)))?
        .map_err(Error::from)
}

async fn verify_blocking(password: &str, user: &User) -> bool {
    let password = password.to_string();
    let hash = user.password_hash.clone();
    let user_id = user.id.clone();

    match tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await {
        Ok(Ok(valid)) => valid,
        Ok(Err(e)) => {
            log::warn!("Stored password hash for {} is unreadable: {}", user_id, e);
            false
        }
        Err(e) => {
            log::warn!("Password verification task failed: {}", e);
            false
        }
    }
}
