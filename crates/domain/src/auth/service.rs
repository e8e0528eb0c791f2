//! Registration, login and bearer-token authentication.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{CartId, Session, User, UserId, ValidationError};
use serde::{Deserialize, Serialize};
use store::{CartStore, CounterStore, SessionStore, StoreError, UserStore};

use super::{
    password::{hash_password, verify_password},
    token::{generate_session_token, hash_session_token, is_well_formed},
};
use crate::{allocator::IdAllocator, error::DomainError};

/// Resolves a bearer token to the user it was issued to.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, bearer_token: &str) -> Result<User, DomainError>;
}

#[async_trait]
impl<A: Authenticator + ?Sized> Authenticator for std::sync::Arc<A> {
    async fn authenticate(&self, bearer_token: &str) -> Result<User, DomainError> {
        (**self).authenticate(bearer_token).await
    }
}

/// Authenticates session tokens against the session store.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator<S> {
    store: S,
}

impl<S: UserStore + SessionStore> TokenAuthenticator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: UserStore + SessionStore> Authenticator for TokenAuthenticator<S> {
    async fn authenticate(&self, bearer_token: &str) -> Result<User, DomainError> {
        if !is_well_formed(bearer_token) {
            return Err(DomainError::Unauthenticated);
        }

        let token_hash = hash_session_token(bearer_token);
        let session = self
            .store
            .find_session(&token_hash)
            .await?
            .ok_or(DomainError::Unauthenticated)?;

        if session.is_expired(Utc::now()) {
            self.store.delete_session(&token_hash).await?;
            return Err(DomainError::Unauthenticated);
        }

        self.store
            .find_user(&session.user_id)
            .await?
            .ok_or(DomainError::Unauthenticated)
    }
}

/// Sign-up request.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

/// Identifiers handed back after sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registered {
    pub user_id: UserId,
    pub cart_id: CartId,
}

/// Issued session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
    pub cart_id: CartId,
    pub is_admin: bool,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Account lifecycle: sign-up, login, logout.
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    store: S,
    ids: IdAllocator<S>,
    token_ttl: Duration,
}

impl<S> AuthService<S>
where
    S: UserStore + SessionStore + CartStore + CounterStore + Clone,
{
    pub fn new(store: S, token_ttl: Duration) -> Self {
        Self {
            ids: IdAllocator::new(store.clone()),
            store,
            token_ttl,
        }
    }

    /// Registers a customer and creates their cart.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<Registered, DomainError> {
        self.create_user(registration, false).await
    }

    /// Creates the administrator account if `username` is not taken yet.
    ///
    /// Returns `None` when the account already exists.
    #[tracing::instrument(skip(self, password))]
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Registered>, DomainError> {
        if self.store.find_user_by_username(username).await?.is_some() {
            tracing::debug!("Administrator account already present");
            return Ok(None);
        }

        let registration = Registration {
            username: username.to_string(),
            email: String::new(),
            password: password.to_string(),
        };
        match self.create_user(registration, true).await {
            Ok(registered) => Ok(Some(registered)),
            Err(DomainError::UsernameTaken(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_user(
        &self,
        registration: Registration,
        is_admin: bool,
    ) -> Result<Registered, DomainError> {
        let username = registration.username.trim().to_string();
        if username.is_empty() {
            return Err(ValidationError::Required("username").into());
        }
        if registration.password.is_empty() {
            return Err(ValidationError::Required("password").into());
        }
        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(DomainError::UsernameTaken(username));
        }

        let password_hash = hash_password(&registration.password)?;
        let user_id = self.ids.next_user_id().await?;
        let user = User {
            id: user_id.clone(),
            is_admin,
            username,
            email: registration.email,
            password_hash,
            created_at: Utc::now(),
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(DomainError::UsernameTaken(user.username)),
            Err(e @ StoreError::AllocationConflict { .. }) => {
                tracing::error!(error = %e, "Allocated user id collided with an existing user");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        let cart_id = CartId::for_user(&user_id);
        self.store.create_cart(&cart_id).await?;

        tracing::info!(user_id = %user_id, is_admin, "User registered");
        Ok(Registered { user_id, cart_id })
    }

    /// Verifies credentials and opens a session.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, DomainError> {
        let user = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "Rejected login");
            return Err(DomainError::InvalidCredentials);
        }

        let token = generate_session_token();
        let now = Utc::now();
        let session = Session {
            token_hash: hash_session_token(&token),
            user_id: user.id.clone(),
            expires_at: now + self.token_ttl,
            created_at: now,
        };
        self.store.insert_session(&session).await?;

        tracing::info!(user_id = %user.id, "Session opened");
        Ok(LoginResponse {
            token,
            cart_id: CartId::for_user(&user.id),
            user_id: user.id,
            is_admin: user.is_admin,
            expires_at: session.expires_at,
        })
    }

    /// Ends the session behind `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), DomainError> {
        Ok(self
            .store
            .delete_session(&hash_session_token(token))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "correct horse".to_string(),
        }
    }

    fn service(store: &InMemoryStore) -> AuthService<InMemoryStore> {
        AuthService::new(store.clone(), Duration::hours(24))
    }

    #[tokio::test]
    async fn register_login_authenticate() {
        let store = InMemoryStore::new();
        let auth = service(&store);
        let authenticator = TokenAuthenticator::new(store.clone());

        let registered = auth.register(registration("ada")).await.unwrap();
        assert_eq!(registered.user_id.as_str(), "U000001");
        assert_eq!(registered.cart_id.as_str(), "C000001");
        assert!(store.cart_exists(&registered.cart_id).await.unwrap());

        let login = auth.login("ada", "correct horse").await.unwrap();
        assert_eq!(login.user_id, registered.user_id);
        assert!(!login.is_admin);

        let user = authenticator.authenticate(&login.token).await.unwrap();
        assert_eq!(user.id, registered.user_id);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = InMemoryStore::new();
        let auth = service(&store);

        auth.register(registration("ada")).await.unwrap();
        let result = auth.register(registration("ada")).await;
        assert!(matches!(result, Err(DomainError::UsernameTaken(_))));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let store = InMemoryStore::new();
        let auth = service(&store);
        auth.register(registration("ada")).await.unwrap();

        assert!(matches!(
            auth.login("ada", "wrong").await,
            Err(DomainError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "wrong").await,
            Err(DomainError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let store = InMemoryStore::new();
        let auth = service(&store);
        let authenticator = TokenAuthenticator::new(store.clone());
        auth.register(registration("ada")).await.unwrap();
        let login = auth.login("ada", "correct horse").await.unwrap();

        auth.logout(&login.token).await.unwrap();

        assert!(matches!(
            authenticator.authenticate(&login.token).await,
            Err(DomainError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let store = InMemoryStore::new();
        let auth = AuthService::new(store.clone(), Duration::seconds(-1));
        let authenticator = TokenAuthenticator::new(store.clone());
        auth.register(registration("ada")).await.unwrap();
        let login = auth.login("ada", "correct horse").await.unwrap();

        assert!(matches!(
            authenticator.authenticate(&login.token).await,
            Err(DomainError::Unauthenticated)
        ));
        let digest = hash_session_token(&login.token);
        assert!(store.find_session(&digest).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_and_unknown_tokens_are_rejected() {
        let authenticator = TokenAuthenticator::new(InMemoryStore::new());

        assert!(matches!(
            authenticator.authenticate("garbage").await,
            Err(DomainError::Unauthenticated)
        ));
        assert!(matches!(
            authenticator.authenticate(&generate_session_token()).await,
            Err(DomainError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let store = InMemoryStore::new();
        let auth = service(&store);

        let first = auth.bootstrap_admin("admin", "secret").await.unwrap();
        let second = auth.bootstrap_admin("admin", "secret").await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        let login = auth.login("admin", "secret").await.unwrap();
        assert!(login.is_admin);
    }
}
