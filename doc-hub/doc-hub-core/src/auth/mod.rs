//! Registration, login and session tokens.

pub mod password;
pub mod token;

pub use token::{Claims, Hs256Tokens, TokenVerifier, SESSION_TTL};

use crate::error::{AuthError, RepoError};
use crate::storage::DocumentRepository;
use std::sync::Arc;
use tracing::{info, warn};

/// Registers users and exchanges credentials for session tokens.
pub struct CredentialService {
    repo: Arc<dyn DocumentRepository>,
    tokens: Arc<Hs256Tokens>,
}

impl CredentialService {
    pub fn new(repo: Arc<dyn DocumentRepository>, tokens: Arc<Hs256Tokens>) -> Self {
        Self { repo, tokens }
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<(), AuthError> {
        password::validate_login(login)?;
        password::validate_password(password)?;

        let owned = password.to_string();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&owned))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))??;

        self.repo.save_user(login, &hash).await?;
        info!(login, "user registered");
        Ok(())
    }

    /// Check `password` and return a fresh session token for `login`.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<String, AuthError> {
        let stored = match self.repo.password_hash(login).await {
            Ok(hash) => hash,
            Err(RepoError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let candidate = password.to_string();
        let valid =
            tokio::task::spawn_blocking(move || password::verify_password(&stored, &candidate))
                .await
                .map_err(|e| AuthError::Hash(e.to_string()))?;
        if !valid {
            warn!(login, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.tokens.issue(login)
    }

    /// Login carried by a valid token.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.decode(token).map(|claims| claims.login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;

    fn service() -> CredentialService {
        CredentialService::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(Hs256Tokens::new("test-secret")),
        )
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let svc = service();
        svc.register("alice123", "Passw0rd!").await.unwrap();
        let token = svc.authenticate("alice123", "Passw0rd!").await.unwrap();
        assert_eq!(svc.verify(&token).unwrap(), "alice123");
    }

    #[tokio::test]
    async fn register_validates_before_storing() {
        let svc = service();
        assert!(matches!(
            svc.register("bad", "Passw0rd!").await,
            Err(AuthError::InvalidLogin)
        ));
        assert!(matches!(
            svc.register("alice123", "weak").await,
            Err(AuthError::InvalidPassword)
        ));
        assert!(matches!(
            svc.authenticate("alice123", "Passw0rd!").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let svc = service();
        svc.register("alice123", "Passw0rd!").await.unwrap();
        assert!(matches!(
            svc.register("alice123", "Passw0rd!").await,
            Err(AuthError::Store(RepoError::DuplicateLogin(_)))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let svc = service();
        svc.register("alice123", "Passw0rd!").await.unwrap();
        assert!(matches!(
            svc.authenticate("alice123", "Passw0rd?").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
