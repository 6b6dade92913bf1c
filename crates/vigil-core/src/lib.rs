//! # vigil-core
//!
//! Offline-first account registration for the Vigil evidence app.
//!
//! This crate provides:
//! - Local user storage over SQLite (`db` and `store` modules)
//! - The backend auth client (`client` module)
//! - Connectivity tracking (`connectivity` module)
//! - Registration, background sync and its scheduler (`services` module)
//! - Password hashing, secret sealing and session tokens (`auth` module)
//! - Configuration (`config` module) and unified error handling (`error` module)

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

// Re-exports for convenience
pub use app::Vigil;
pub use config::{AppConfig, SyncSettings};
pub use db::Database;
pub use error::{Error, Result};

pub use models::{
    AuthOutcome, AuthResponse, Claims, LoginRequest, RegisterRequest, Session, User, UserResponse,
};

pub use services::{
    RecordFailure, RegistrationRepository, SchedulerStatus, SyncOutcome, SyncReport,
    SyncScheduler, UserSyncTask,
};
