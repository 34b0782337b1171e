//! Sign-up, sign-in and logout
//!
//! Sessions are stateless JWTs; logging out puts the token on the blacklist
//! for one token lifetime.

use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    blacklist::TokenBlacklist,
    error::{AuthError, AuthResult},
    jwt::JwtService,
    models::{Credentials, User},
    password::{hash_password, verify_password},
    repositories::UserRepository,
    validation::{validate_login, validate_password},
};

/// Token handed out on successful sign-in
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
}

/// Session manager for credential checks and token lifecycle
#[derive(Clone)]
pub struct SessionManager {
    users: UserRepository,
    jwt_service: JwtService,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        users: UserRepository,
        jwt_service: JwtService,
        blacklist: Arc<dyn TokenBlacklist>,
    ) -> Self {
        Self {
            users,
            jwt_service,
            blacklist,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn blacklist(&self) -> &dyn TokenBlacklist {
        self.blacklist.as_ref()
    }

    /// Register a client account
    pub async fn sign_up(&self, credentials: &Credentials) -> AuthResult<User> {
        validate_login(&credentials.login).map_err(AuthError::Validation)?;
        validate_password(&credentials.password).map_err(AuthError::Validation)?;

        let password_hash = hash_password(&credentials.password)?;

        self.users
            .create(&credentials.login, &password_hash)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    AuthError::DuplicateLogin(credentials.login.clone())
                } else {
                    AuthError::Database(e)
                }
            })
    }

    /// Check credentials and issue a token
    pub async fn sign_in(&self, credentials: &Credentials) -> AuthResult<SignedIn> {
        let Some(user) = self.users.find_by_login(&credentials.login).await? else {
            warn!("Sign-in for unknown login {}", credentials.login);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&credentials.password, &user.password_hash)? {
            warn!("Wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt_service.issue(user.id, user.is_admin)?;
        info!("User {} signed in", user.id);

        Ok(SignedIn { user, token })
    }

    /// Revoke a token for the rest of its lifetime
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        let claims = self.jwt_service.parse(token)?;

        self.blacklist
            .revoke(token, self.jwt_service.ttl())
            .await
            .map_err(AuthError::Blacklist)?;

        info!("User {} logged out", claims.sub);
        Ok(())
    }

    /// Profile of the authenticated caller
    pub async fn user_info(&self, user_id: i64) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(user_id))
    }
}
