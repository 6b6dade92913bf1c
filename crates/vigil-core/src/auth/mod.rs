//! Authentication module - password hashing, replay-secret sealing and session tokens
//!
//! Offline login needs a verifier that survives sync, while the sync task needs the
//! original password to replay a queued registration. The two concerns are split:
//! - a bcrypt hash is kept for the lifetime of the row (offline verification)
//! - the password itself is sealed with AES-256-GCM and dropped once the row syncs

pub mod session;
pub mod vault;

pub use session::SessionSigner;
pub use vault::SecretVault;

/// Hash a password with an explicit bcrypt cost
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}
