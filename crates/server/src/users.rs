// crates/server/src/users.rs
//! Users service: registration, login and token sessions

use crate::auth::{JwtIssuer, PasswordHasher, TokenError, TokenKind};
use crate::error::{AuthError, AuthResult};
use crate::storage::{SessionId, Storage, StorageError, UserId};
use std::sync::Arc;
use vaultsync_core::{
    AccessToken, Credentials, RefreshToken, TokenPair, MIN_PASSWORD_LEN,
};

/// Identity behind a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub session_id: SessionId,
}

/// Issues and validates token pairs on top of the storage collaborator
pub struct UsersService {
    storage: Arc<dyn Storage>,
    issuer: JwtIssuer,
    hasher: PasswordHasher,
}

impl UsersService {
    pub fn new(storage: Arc<dyn Storage>, issuer: JwtIssuer, hasher: PasswordHasher) -> Self {
        Self {
            storage,
            issuer,
            hasher,
        }
    }

    /// Registers a user and opens its first session
    pub async fn sign_up(&self, credentials: &Credentials) -> AuthResult<TokenPair> {
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let hasher = self.hasher;
        let password = credentials.password.clone();
        let password_hash = blocking(move || hasher.hash(&password)).await?;

        let user = self
            .storage
            .create_user(&credentials.login, &password_hash)
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => AuthError::LoginTaken(credentials.login.clone()),
                other => AuthError::Storage(other),
            })?;

        log::info!("Registered user {}", user.id);
        self.open_session(user.id).await
    }

    /// Checks the password and opens a new session
    pub async fn log_in(&self, credentials: &Credentials) -> AuthResult<TokenPair> {
        let user = self
            .storage
            .user_by_login(&credentials.login)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => AuthError::UnknownUser(credentials.login.clone()),
                other => AuthError::Storage(other),
            })?;

        let hasher = self.hasher;
        let password = credentials.password.clone();
        let stored = user.password_hash.clone();
        if !blocking(move || hasher.verify(&password, &stored)).await? {
            log::warn!("Failed login for user {}", user.id);
            return Err(AuthError::WrongPassword);
        }

        self.open_session(user.id).await
    }

    /// Closes the session of a refresh token
    pub async fn log_out(&self, refresh: &RefreshToken) -> AuthResult<()> {
        let claims = self
            .issuer
            .verify(refresh.as_str(), TokenKind::Refresh)
            .map_err(refresh_error)?;
        let session_id = claims.session_id().map_err(refresh_error)?;

        self.storage
            .close_session(session_id)
            .await
            .map_err(session_lookup_error)?;
        log::info!("Closed session {}", session_id);
        Ok(())
    }

    /// Rotates the token pair of a session
    ///
    /// Only the refresh token most recently issued for the session is
    /// accepted.
    pub async fn renew(&self, refresh: &RefreshToken) -> AuthResult<TokenPair> {
        let claims = self
            .issuer
            .verify(refresh.as_str(), TokenKind::Refresh)
            .map_err(refresh_error)?;
        let user_id = claims.user_id().map_err(refresh_error)?;
        let session_id = claims.session_id().map_err(refresh_error)?;

        let session = self
            .storage
            .session(session_id)
            .await
            .map_err(session_lookup_error)?;
        if session.logged_out || session.refresh_token != refresh.as_str() {
            return Err(AuthError::SessionClosed);
        }
        if session.user_id != user_id {
            return Err(AuthError::InvalidToken("session owner mismatch".to_string()));
        }

        let pair = self.issue_pair(user_id, session_id)?;
        self.storage
            .update_session_token(session_id, pair.refresh.as_str())
            .await?;
        log::debug!("Rotated tokens of session {}", session_id);
        Ok(pair)
    }

    /// Resolves an access token to its user
    pub async fn authenticate(&self, access: &AccessToken) -> AuthResult<Principal> {
        let claims = self
            .issuer
            .verify(access.as_str(), TokenKind::Access)
            .map_err(|e| match e {
                TokenError::Expired => AuthError::AccessTokenExpired,
                other => AuthError::InvalidToken(other.to_string()),
            })?;
        let invalid = |e: TokenError| AuthError::InvalidToken(e.to_string());
        let principal = Principal {
            user_id: claims.user_id().map_err(invalid)?,
            session_id: claims.session_id().map_err(invalid)?,
        };

        let session = self
            .storage
            .session(principal.session_id)
            .await
            .map_err(session_lookup_error)?;
        if session.logged_out {
            return Err(AuthError::SessionClosed);
        }
        Ok(principal)
    }

    async fn open_session(&self, user_id: UserId) -> AuthResult<TokenPair> {
        let session = self.storage.create_session(user_id).await?;
        let pair = self.issue_pair(user_id, session.id)?;
        self.storage
            .update_session_token(session.id, pair.refresh.as_str())
            .await?;
        log::info!("Opened session {} for user {}", session.id, user_id);
        Ok(pair)
    }

    fn issue_pair(&self, user_id: UserId, session_id: SessionId) -> AuthResult<TokenPair> {
        let sign = |kind| {
            self.issuer
                .issue(kind, user_id, session_id)
                .map_err(|e| AuthError::Signing(e.to_string()))
        };
        Ok(TokenPair::new(
            AccessToken::new(sign(TokenKind::Access)?),
            RefreshToken::new(sign(TokenKind::Refresh)?),
        ))
    }
}

fn refresh_error(err: TokenError) -> AuthError {
    match err {
        TokenError::Expired => AuthError::RefreshTokenExpired,
        other => AuthError::InvalidToken(other.to_string()),
    }
}

fn session_lookup_error(err: StorageError) -> AuthError {
    match err {
        StorageError::NotFound(_) => AuthError::InvalidToken("unknown session".to_string()),
        other => AuthError::Storage(other),
    }
}

/// Runs bcrypt off the async workers
async fn blocking<T, F>(f: F) -> AuthResult<T>
where
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use std::time::Duration;

    fn service() -> UsersService {
        UsersService::new(
            Arc::new(MemoryStorage::new()),
            JwtIssuer::new(
                "users-service-test-secret",
                Duration::from_secs(60),
                Duration::from_secs(3600),
            ),
            PasswordHasher::new(4),
        )
    }

    fn alice() -> Credentials {
        Credentials::new("alice", "correct horse")
    }

    #[tokio::test]
    async fn test_sign_up_then_log_in() {
        let users = service();
        let first = users.sign_up(&alice()).await.unwrap();
        let second = users.log_in(&alice()).await.unwrap();

        let a = users.authenticate(&first.access).await.unwrap();
        let b = users.authenticate(&second.access).await.unwrap();
        assert_eq!(a.user_id, b.user_id);
        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up() {
        let users = service();
        users.sign_up(&alice()).await.unwrap();
        assert!(matches!(
            users.sign_up(&alice()).await,
            Err(AuthError::LoginTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_weak_password() {
        let users = service();
        let result = users.sign_up(&Credentials::new("bob", "12345")).await;
        assert!(matches!(result, Err(AuthError::WeakPassword { min: 6 })));
    }

    #[tokio::test]
    async fn test_log_in_failures() {
        let users = service();
        users.sign_up(&alice()).await.unwrap();

        assert!(matches!(
            users.log_in(&Credentials::new("alice", "wrong horse")).await,
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            users.log_in(&Credentials::new("carol", "whatever")).await,
            Err(AuthError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_renew_rotates_refresh_token() {
        let users = service();
        let pair = users.sign_up(&alice()).await.unwrap();

        let renewed = users.renew(&pair.refresh).await.unwrap();
        assert_ne!(renewed.refresh, pair.refresh);
        users.authenticate(&renewed.access).await.unwrap();

        // The superseded refresh token is dead
        assert!(matches!(
            users.renew(&pair.refresh).await,
            Err(AuthError::SessionClosed)
        ));
        users.renew(&renewed.refresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_log_out_closes_session() {
        let users = service();
        let pair = users.sign_up(&alice()).await.unwrap();
        users.log_out(&pair.refresh).await.unwrap();

        assert!(matches!(
            users.renew(&pair.refresh).await,
            Err(AuthError::SessionClosed)
        ));
        assert!(matches!(
            users.authenticate(&pair.access).await,
            Err(AuthError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_garbage_tokens() {
        let users = service();
        assert!(matches!(
            users.authenticate(&AccessToken::new("garbage")).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            users.renew(&RefreshToken::new("garbage")).await,
            Err(AuthError::InvalidToken(_))
        ));
    }
}
