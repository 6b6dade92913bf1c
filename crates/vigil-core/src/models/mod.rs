//! Data models for the Vigil account layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Local user row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub server_id: Option<String>,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    /// Encrypted replay secret; only present while the registration is unsynced
    pub sealed_password: Option<String>,
    pub is_synced: bool,
    pub sync_attempts: i64,
    pub last_sync_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User response (without sensitive fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub server_id: Option<String>,
    pub email: String,
    pub name: String,
    pub is_synced: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            server_id: user.server_id,
            email: user.email,
            name: user.name,
            is_synced: user.is_synced,
            created_at: user.created_at,
        }
    }
}

/// Data for inserting a queued registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub sealed_password: Option<String>,
}

/// Data for recording a confirmed remote account
#[derive(Debug, Clone)]
pub struct SyncedUser {
    pub server_id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Request for user registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request for user login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User payload returned by the backend on success
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Structured backend response for login and register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(deserialize_with = "status_flag")]
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user: Option<RemoteUser>,
}

impl AuthResponse {
    pub fn success(message: impl Into<String>, user: Option<RemoteUser>) -> Self {
        Self {
            status: true,
            message: message.into(),
            user,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            user: None,
        }
    }
}

/// Authenticated session handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    /// True when the session was granted from cached local credentials
    pub offline: bool,
}

/// Non-error results of register/login
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    /// Accepted locally, the background sync will confirm it with the backend
    Queued { local_id: String, message: String },
    /// The backend accepted the registration but the account still needs verification
    PendingVerification { message: String },
    LoggedIn(Session),
}

impl AuthOutcome {
    pub fn message(&self) -> &str {
        match self {
            AuthOutcome::Queued { message, .. } => message,
            AuthOutcome::PendingVerification { message } => message,
            AuthOutcome::LoggedIn(_) => "Logged in",
        }
    }
}

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // local user id
    pub email: String,
    pub exp: i64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

// Backends answer with `true`, `"success"`, `"ok"` or `1`.
fn status_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Status {
        Flag(bool),
        Code(i64),
        Text(String),
    }

    Ok(match Status::deserialize(deserializer)? {
        Status::Flag(b) => b,
        Status::Code(n) => n == 1,
        Status::Text(s) => matches!(
            s.to_ascii_lowercase().as_str(),
            "success" | "ok" | "true" | "1"
        ),
    })
}
