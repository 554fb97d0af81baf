// crates/server/src/auth/jwt.rs
//! JWT token issuer
//!
//! Access and refresh tokens are HS256 JWTs signed with the server secret.
//! Both carry the session id, so a refresh token can be matched against
//! the one stored for its session.

use crate::storage::{SessionId, UserId};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Issuer claim of every token
pub const ISSUER: &str = "vaultsync";

/// Which half of a token pair a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Session id
    pub sid: String,
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
    pub iss: String,
    /// Unique per token, so two rotations within one second still differ
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        UserId::from_string(&self.sub).map_err(|e| TokenError::Malformed(e.to_string()))
    }

    pub fn session_id(&self) -> Result<SessionId, TokenError> {
        SessionId::from_string(&self.sid).map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

/// Validation outcome other than a valid token
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Signs and validates token pairs
#[derive(Clone)]
pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<String, TokenError> {
        self.issue_at(kind, user_id, session_id, now())
    }

    fn issue_at(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: SessionId,
        issued_at: u64,
    ) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            kind,
            exp: issued_at + ttl.as_secs(),
            iat: issued_at,
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validates signature, issuer, expiry and kind
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.kind != expected {
            return Err(TokenError::WrongKind { expected });
        }
        Ok(data.claims)
    }
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

fn now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}
