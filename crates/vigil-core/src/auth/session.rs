//! Session tokens (JWT)

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::error::{Error, Result};
use crate::models::{Claims, Session, User, UserResponse};

const TOKEN_EXPIRY_DAYS: i64 = 7;

/// Issues and verifies HS256 session tokens
#[derive(Clone)]
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Create a JWT token for a user
    pub fn create_token(&self, user: &User) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::days(TOKEN_EXPIRY_DAYS))
            .ok_or_else(|| Error::internal("Token expiry overflow"))?
            .timestamp();

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: expiration,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(token_data.claims)
    }

    /// Build the session handed back after a successful login
    pub fn issue(&self, user: User, offline: bool) -> Result<Session> {
        let access_token = self.create_token(&user)?;
        Ok(Session {
            user: UserResponse::from(user),
            access_token,
            token_type: "bearer".to_string(),
            expires_in: TOKEN_EXPIRY_DAYS * 24 * 60 * 60,
            offline,
        })
    }
}
