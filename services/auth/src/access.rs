//! Access control core
//!
//! A request moves from unauthenticated to authenticated in four checks, in
//! this order: bearer prefix, blacklist, signature/expiry, role. Routes
//! declare the roles they admit with an [`Access`] value and a single
//! interceptor evaluates it.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    blacklist::TokenBlacklist,
    jwt::{Claims, JwtService},
};

/// Cookie carrying `Bearer <token>` after sign-in
pub const ACCESS_COOKIE: &str = "AccessToken";
pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

/// Set of roles a route admits. The empty set admits any authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access(&'static [Role]);

impl Access {
    pub const AUTHENTICATED: Access = Access(&[]);
    pub const CLIENT: Access = Access(&[Role::Client]);
    pub const ADMIN: Access = Access(&[Role::Admin]);
    pub const CLIENT_OR_ADMIN: Access = Access(&[Role::Client, Role::Admin]);

    pub fn permits(&self, role: Role) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }

    pub fn authorize(&self, identity: &Identity) -> Result<(), AccessError> {
        if self.permits(identity.role()) {
            Ok(())
        } else {
            warn!(
                "User {} with role {:?} denied, route requires {:?}",
                identity.user_id,
                identity.role(),
                self.0
            );
            Err(AccessError::Forbidden("role not permitted"))
        }
    }
}

/// Caller identity attached to the request once the token checks pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub is_admin: bool,
}

impl Identity {
    pub fn role(&self) -> Role {
        if self.is_admin {
            Role::Admin
        } else {
            Role::Client
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            is_admin: claims.is_admin,
        }
    }
}

/// Raw bearer token the caller presented, for handlers that revoke it
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub token: BearerToken,
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("access check failed: {0}")]
    Internal(String),
}

/// Pull the token from the `AccessToken` cookie, falling back to the
/// `Authorization` header. Either source must carry the `Bearer ` prefix.
pub fn extract_token(headers: &HeaderMap) -> Result<String, AccessError> {
    let jar = CookieJar::from_headers(headers);

    let raw = match jar.get(ACCESS_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(AccessError::Forbidden("missing token"))?,
    };

    let token = raw
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AccessError::Forbidden("missing bearer prefix"))?
        .trim();

    if token.is_empty() {
        return Err(AccessError::Forbidden("missing token"));
    }

    Ok(token.to_string())
}

/// Run the token checks and resolve the caller identity
pub async fn authenticate(
    headers: &HeaderMap,
    jwt: &JwtService,
    blacklist: &dyn TokenBlacklist,
) -> Result<Authenticated, AccessError> {
    let token = extract_token(headers)?;

    let revoked = blacklist.is_revoked(&token).await.map_err(|e| {
        warn!("Blacklist lookup failed: {}", e);
        AccessError::Internal(e.to_string())
    })?;
    if revoked {
        return Err(AccessError::Forbidden("token revoked"));
    }

    let claims = jwt.parse(&token).map_err(|e| {
        warn!("Rejected token: {}", e);
        AccessError::Forbidden("invalid token")
    })?;

    Ok(Authenticated {
        identity: claims.into(),
        token: BearerToken(token),
    })
}
