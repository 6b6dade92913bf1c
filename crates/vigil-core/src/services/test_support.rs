//! In-memory doubles for service tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::client::AuthClient;
use crate::error::{Error, Result};
use crate::models::{
    AuthResponse, LoginRequest, NewUser, RegisterRequest, RemoteUser, SyncedUser, User,
};
use crate::store::UserStore;

// ============================================================================
// Mock Store
// ============================================================================

/// Mock implementation of UserStore for testing
#[derive(Default)]
pub struct MockUserStore {
    users: Mutex<HashMap<String, User>>,
    fail_scan: Mutex<bool>,
}

impl MockUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().insert(user.id.clone(), user);
        self
    }

    /// Make `list_unsynced` fail
    pub fn failing_scan(self) -> Self {
        *self.fail_scan.lock().unwrap() = true;
        self
    }

    pub fn all(&self) -> Vec<User> {
        self.users.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.users.lock().unwrap().get(id).cloned()
    }

    pub fn by_email(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    /// Create a test user with minimal required fields
    pub fn create_test_user(id: &str, email: &str, password_hash: &str, sealed: Option<&str>) -> User {
        User {
            id: id.to_string(),
            server_id: None,
            email: email.to_string(),
            name: format!("Test {}", id),
            password_hash: password_hash.to_string(),
            sealed_password: sealed.map(str::to_string),
            is_synced: false,
            sync_attempts: 0,
            last_sync_error: None,
            last_sync_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl UserStore for MockUserStore {
    async fn insert(&self, new_user: NewUser) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new_user.email) {
            return Err(Error::internal("UNIQUE constraint failed: users.email"));
        }
        let now = Utc::now();
        let user = User {
            id: new_user.id.clone(),
            server_id: None,
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            sealed_password: new_user.sealed_password,
            is_synced: false,
            sync_attempts: 0,
            last_sync_error: None,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.by_email(email))
    }

    async fn list_unsynced(&self) -> Result<Vec<User>> {
        if *self.fail_scan.lock().unwrap() {
            return Err(Error::internal("database is locked"));
        }
        let users = self.users.lock().unwrap();
        let mut pending: Vec<User> = users.values().filter(|u| !u.is_synced).cloned().collect();
        pending.sort_by_key(|u| u.created_at);
        Ok(pending)
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let mut all = self.all();
        all.sort_by_key(|u| u.created_at);
        Ok(all)
    }

    async fn count_unsynced(&self) -> Result<i64> {
        Ok(self.all().iter().filter(|u| !u.is_synced).count() as i64)
    }

    async fn update_pending(
        &self,
        id: &str,
        name: &str,
        password_hash: &str,
        sealed_password: &str,
    ) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(id).filter(|u| !u.is_synced) {
            user.name = name.to_string();
            user.password_hash = password_hash.to_string();
            user.sealed_password = Some(sealed_password.to_string());
            user.last_sync_error = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn upsert_synced(&self, synced: SyncedUser) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        let now = Utc::now();
        if let Some(user) = users.values_mut().find(|u| u.email == synced.email) {
            user.server_id = Some(synced.server_id);
            if !synced.name.is_empty() {
                user.name = synced.name;
            }
            user.password_hash = synced.password_hash;
            user.sealed_password = None;
            user.is_synced = true;
            user.last_sync_error = None;
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: Some(synced.server_id),
            email: synced.email,
            name: synced.name,
            password_hash: synced.password_hash,
            sealed_password: None,
            is_synced: true,
            sync_attempts: 0,
            last_sync_error: None,
            last_sync_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn mark_synced(&self, id: &str, server_id: &str) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(id).filter(|u| !u.is_synced) {
            Some(user) => {
                user.is_synced = true;
                user.server_id = Some(server_id.to_string());
                user.sealed_password = None;
                user.last_sync_error = None;
                user.sync_attempts += 1;
                user.last_sync_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(id) {
            user.sync_attempts += 1;
            user.last_sync_error = Some(error.to_string());
            user.last_sync_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ============================================================================
// Mock Auth Client
// ============================================================================

/// Scripted backend reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Success; `Some(id)` includes a user payload
    Accept(Option<&'static str>),
    Reject(&'static str),
    /// Transport failure
    Unreachable,
}

/// Mock implementation of AuthClient with per-email scripted replies
pub struct MockAuthClient {
    default_reply: Reply,
    replies: Mutex<HashMap<String, Reply>>,
    passwords: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockAuthClient {
    pub fn new(default_reply: Reply) -> Self {
        Self {
            default_reply,
            replies: Mutex::new(HashMap::new()),
            passwords: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, email: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(email.to_string(), reply);
        self
    }

    /// Calls made so far, as "register:<email>" / "login:<email>"
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Password last sent for `email`
    pub fn password_sent(&self, email: &str) -> Option<String> {
        self.passwords.lock().unwrap().get(email).cloned()
    }

    fn respond(&self, kind: &str, email: &str, name: &str, password: &str) -> Result<AuthResponse> {
        self.calls.lock().unwrap().push(format!("{}:{}", kind, email));
        self.passwords
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            Reply::Accept(id) => Ok(AuthResponse::success(
                "Registration successful, please verify your email",
                id.map(|id| RemoteUser {
                    id: id.to_string(),
                    name: name.to_string(),
                    email: email.to_string(),
                }),
            )),
            Reply::Reject(message) => Ok(AuthResponse::failure(message)),
            Reply::Unreachable => Err(Error::transport("Connection failed")),
        }
    }
}

#[async_trait]
impl AuthClient for MockAuthClient {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.respond("register", &request.email, &request.name, &request.password)
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.respond("login", &request.email, "", &request.password)
    }
}
