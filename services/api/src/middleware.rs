//! Access middleware
//!
//! Each protected route carries an [`AccessGuard`] naming the roles it
//! admits. [`require_access`] runs the token checks, evaluates the guard and
//! stores the caller's [`auth::Identity`] and [`auth::BearerToken`] in the request
//! extensions for the handler.

use auth::{Access, access::authenticate};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Middleware state: the app state plus the route's role requirement
#[derive(Clone)]
pub struct AccessGuard {
    state: AppState,
    access: Access,
}

impl AccessGuard {
    pub fn new(state: &AppState, access: Access) -> Self {
        Self {
            state: state.clone(),
            access,
        }
    }
}

/// Reject the request unless it carries a live token whose role the guard
/// admits
pub async fn require_access(
    State(guard): State<AccessGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let sessions = &guard.state.sessions;
    let authenticated = authenticate(req.headers(), sessions.jwt(), sessions.blacklist()).await?;

    guard.access.authorize(&authenticated.identity)?;

    req.extensions_mut().insert(authenticated.identity);
    req.extensions_mut().insert(authenticated.token);

    Ok(next.run(req).await)
}

/// Attach the caller's identity when a valid token is present, without
/// rejecting anonymous callers
pub async fn optional_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let sessions = &state.sessions;
    match authenticate(req.headers(), sessions.jwt(), sessions.blacklist()).await {
        Ok(authenticated) => {
            req.extensions_mut().insert(authenticated.identity);
        }
        Err(e) => debug!("Continuing anonymously: {}", e),
    }

    next.run(req).await
}
