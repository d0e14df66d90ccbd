use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::domain::{Role, User, UserId};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 12;

/// Credential settings shared by login and request authentication.
#[derive(Clone)]
pub struct AuthSettings {
    token_secret: String,
    token_ttl: Duration,
    hash_cost: u32,
}

impl AuthSettings {
    pub fn new(token_secret: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            token_secret: token_secret.into(),
            token_ttl,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// bcrypt work factor; values outside 4..=31 fail at hashing time.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn hash_cost(&self) -> u32 {
        self.hash_cost
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    sub: u64,
    role: Role,
    iat: i64,
    exp: i64,
}

/// A signed bearer token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signer and verifier. Expiry is checked against the caller's clock, not the system time.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.token_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: settings.token_ttl,
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id.0,
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Signing)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(AuthError::Rejected)?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or(AuthError::Expired)?;
        if now >= expires_at {
            return Err(AuthError::Expired);
        }
        Ok(UserId(data.claims.sub))
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Malformed stored hashes count as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token could not be signed: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
}
