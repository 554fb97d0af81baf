//! Runtime settings of the server

use crate::auth::{JwtIssuer, PasswordHasher};
use std::time::Duration;
use vaultsync_config::ServerConfig;

/// Settings the server services are built from
#[derive(Clone)]
pub struct ServerSettings {
    pub token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password_hash_cost: u32,
}

impl ServerSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            token_secret: config.token_secret.clone(),
            access_token_ttl: config.access_token_ttl(),
            refresh_token_ttl: config.refresh_token_ttl(),
            password_hash_cost: config.password_hash_cost,
        }
    }

    pub fn with_password_hash_cost(mut self, cost: u32) -> Self {
        self.password_hash_cost = cost;
        self
    }

    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn issuer(&self) -> JwtIssuer {
        JwtIssuer::new(
            &self.token_secret,
            self.access_token_ttl,
            self.refresh_token_ttl,
        )
    }

    pub fn hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.password_hash_cost)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl std::fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSettings")
            .field("token_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("password_hash_cost", &self.password_hash_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = ServerConfig {
            access_token_ttl_secs: 120,
            ..Default::default()
        };
        let settings = ServerSettings::from_config(&config);
        assert_eq!(settings.access_token_ttl, Duration::from_secs(120));
        assert_eq!(settings.hasher().cost(), config.password_hash_cost);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = ServerSettings::default();
        assert!(!format!("{:?}", settings).contains(&settings.token_secret));
    }
}
