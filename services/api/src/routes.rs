//! API service routes

use auth::{
    Access, BearerToken, Identity,
    access::{ACCESS_COOKIE, BEARER_PREFIX},
    models::{Credentials, User},
};
use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use tracing::warn;

use crate::{
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    forms::{ImageUpload, ThreatForm},
    lifecycle::{ListFilter, ListQuery, Scope},
    middleware::{AccessGuard, optional_identity, require_access},
    models::{
        MessageResponse, MonitoringRequest, NewStatus, PaymentFinishRequest, PaymentStartRequest,
        RequestWithThreats, SignInResponse, Threat,
        threat::{ThreatFilter, ThreatList, ThreatQuery},
    },
    payment::PaymentError,
    repositories::CatalogError,
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        .route("/api/logout", post(logout))
        .route("/api/check-auth", get(check_auth))
        .route_layer(middleware::from_fn_with_state(
            AccessGuard::new(&state, Access::AUTHENTICATED),
            require_access,
        ));

    let client_routes = Router::new()
        .route("/api/threats/request/:threatId", post(add_threat_to_request))
        .route("/api/monitoring-requests", delete(delete_draft))
        .route("/api/monitoring-requests/client", put(submit_draft))
        .route(
            "/api/monitoring-requests/user-payment-start",
            put(start_payment),
        )
        .route(
            "/api/monitoring-request-threats/threats/:threatId",
            delete(remove_threat_from_request),
        )
        .route_layer(middleware::from_fn_with_state(
            AccessGuard::new(&state, Access::CLIENT),
            require_access,
        ));

    let member_routes = Router::new()
        .route("/api/monitoring-requests", get(list_requests))
        .route("/api/monitoring-requests/:id", get(get_request))
        .route_layer(middleware::from_fn_with_state(
            AccessGuard::new(&state, Access::CLIENT_OR_ADMIN),
            require_access,
        ));

    let admin_routes = Router::new()
        .route("/api/threats", post(create_threat))
        .route("/api/threats/:id", put(update_threat).delete(delete_threat))
        .route("/api/monitoring-requests/admin/:requestId", put(review_request))
        .route_layer(middleware::from_fn_with_state(
            AccessGuard::new(&state, Access::ADMIN),
            require_access,
        ));

    let catalog_routes = Router::new()
        .route("/api/threats", get(list_threats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_identity,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/signUp", post(sign_up))
        .route("/api/signIn", post(sign_in))
        .route("/api/threats/:id", get(get_threat))
        .route(
            "/api/monitoring-requests/user-payment-finish",
            put(finish_payment),
        )
        .merge(catalog_routes)
        .merge(authenticated_routes)
        .merge(client_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .with_state(state)
}

/// Database and cache reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or_else(|e| {
            warn!("Database health check failed: {}", e);
            false
        });
    let cache = state.redis_pool.health_check().await.unwrap_or_else(|e| {
        warn!("Cache health check failed: {}", e);
        false
    });

    let (status, label) = if database && cache {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "threat-monitoring-api",
            "database": database,
            "cache": cache,
        })),
    )
}

/// Register a client account
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let user = state.sessions.sign_up(&credentials).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Check credentials; the token is returned in the body and as a cookie
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(CookieJar, Json<SignInResponse>)> {
    let signed_in = state.sessions.sign_in(&credentials).await?;

    let cookie = Cookie::build((
        ACCESS_COOKIE,
        format!("{}{}", BEARER_PREFIX, signed_in.token),
    ))
    .path("/")
    .http_only(true);

    let body = SignInResponse {
        access_token: signed_in.token,
        token_type: "Bearer",
        expires_in: state.sessions.jwt().ttl().as_secs(),
        user_id: signed_in.user.id,
        login: signed_in.user.login,
        is_admin: signed_in.user.is_admin,
    };

    Ok((jar.add(cookie), Json(body)))
}

/// Revoke the caller's token and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    state.sessions.logout(&token.0).await?;

    let jar = jar.remove(Cookie::build(ACCESS_COOKIE).path("/"));
    Ok((jar, Json(MessageResponse::new("logged out"))))
}

/// Profile of the caller
pub async fn check_auth(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<User>> {
    let user = state.sessions.user_info(identity.user_id).await?;
    Ok(Json(user))
}

/// Active catalog, filtered by name and price. Authenticated callers also
/// get the id of their draft.
pub async fn list_threats(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Query(query): Query<ThreatQuery>,
) -> ApiResult<Json<ThreatList>> {
    let filter = ThreatFilter::parse(&query).map_err(ApiError::BadRequest)?;
    let threats = state.threat_repository.list(&filter).await?;

    let draft_id = match identity {
        Some(Extension(identity)) => state.request_repository.draft_id(identity.user_id).await?,
        None => None,
    };

    Ok(Json(ThreatList { threats, draft_id }))
}

pub async fn get_threat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Threat>> {
    Ok(Json(state.threat_repository.get_by_id(id).await?))
}

async fn upload(state: &AppState, image: ImageUpload) -> ApiResult<String> {
    let url = state
        .images
        .save_image(&image.file_name, image.content_type.as_deref(), image.bytes)
        .await?;
    Ok(url)
}

/// Remove an uploaded image that no stored row points at
async fn discard_upload(state: &AppState, url: &str, err: &CatalogError) {
    if err.row_written() {
        return;
    }
    if let Err(e) = state.images.delete_image(url).await {
        warn!("Failed to remove orphaned image {}: {}", url, e);
    }
}

/// Add a catalog item from a multipart form
pub async fn create_threat(
    State(state): State<AppState>,
    form: ThreatForm,
) -> ApiResult<impl IntoResponse> {
    let mut draft = form.draft()?;

    if let Some(image) = form.image {
        draft.image = upload(&state, image).await?;
    }

    let threat = match state.threat_repository.create(&draft).await {
        Ok(threat) => threat,
        Err(e) => {
            if !draft.image.is_empty() {
                discard_upload(&state, &draft.image, &e).await;
            }
            return Err(e.into());
        }
    };
    Ok((StatusCode::CREATED, Json(threat)))
}

/// Partially update a catalog item. A new image replaces the stored object.
pub async fn update_threat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    form: ThreatForm,
) -> ApiResult<Json<Threat>> {
    let mut patch = form.patch()?;

    // Fail before uploading anything for a missing item
    state.threat_repository.get_by_id(id).await?;

    let uploaded = match form.image {
        Some(image) => Some(upload(&state, image).await?),
        None => None,
    };
    patch.image = uploaded.clone();

    let (previous, updated) = match state.threat_repository.update(id, patch).await {
        Ok(pair) => pair,
        Err(e) => {
            if let Some(url) = &uploaded {
                discard_upload(&state, url, &e).await;
            }
            return Err(e.into());
        }
    };

    if !previous.image.is_empty() && previous.image != updated.image {
        if let Err(e) = state.images.delete_image(&previous.image).await {
            warn!("Failed to remove replaced image {}: {}", previous.image, e);
        }
    }

    Ok(Json(updated))
}

pub async fn delete_threat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.threat_repository.soft_delete(id).await?;
    Ok(Json(MessageResponse::new("threat deleted")))
}

/// Put a catalog item into the caller's draft, creating the draft if needed
pub async fn add_threat_to_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(threat_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let request_id = state
        .request_repository
        .add_threat(identity.user_id, threat_id)
        .await?;

    Ok(Json(json!({
        "message": "threat added to request",
        "requestId": request_id,
    })))
}

pub async fn remove_threat_from_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(threat_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let RequestWithThreats { request, threats } = state
        .request_repository
        .remove_threat(identity.user_id, threat_id)
        .await?;

    Ok(Json(json!({
        "message": "threat removed from request",
        "monitoringRequest": request,
        "threats": threats,
    })))
}

/// Requests visible to the caller: all for admins, their own for clients
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<MonitoringRequest>>> {
    let filter = ListFilter::parse(&query)?;
    let requests = state
        .request_repository
        .list(&filter, Scope::from(&identity))
        .await?;

    Ok(Json(requests))
}

pub async fn get_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RequestWithThreats>> {
    let request = state
        .request_repository
        .get_by_id(id, Scope::from(&identity))
        .await?;

    Ok(Json(request))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MessageResponse>> {
    state.request_repository.delete_draft(identity.user_id).await?;
    Ok(Json(MessageResponse::new("request deleted")))
}

/// Creator hands their draft in
pub async fn submit_draft(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<NewStatus>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .request_repository
        .transition_by_client(identity.user_id, body.target()?)
        .await?;

    Ok(Json(MessageResponse::new("status changed")))
}

/// Admin accepts or cancels a submitted request
pub async fn review_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(request_id): Path<i64>,
    Json(body): Json<NewStatus>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .request_repository
        .transition_by_admin(identity.user_id, request_id, body.target()?)
        .await?;

    Ok(Json(MessageResponse::new("status changed")))
}

/// Hand a submitted request to the payment service
pub async fn start_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<PaymentStartRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.payments.is_configured() {
        return Err(PaymentError::NotConfigured.into());
    }

    state
        .request_repository
        .start_payment(identity.user_id, body.request_id)
        .await?;

    if let Err(e) = state.payments.request_payment(body.request_id).await {
        warn!("Payment hand-off for request {} failed: {}", body.request_id, e);
        state
            .request_repository
            .finish_payment(body.request_id, false)
            .await?;
        return Err(e.into());
    }

    Ok(Json(MessageResponse::new("payment started")))
}

/// Callback from the payment service
pub async fn finish_payment(
    State(state): State<AppState>,
    Json(body): Json<PaymentFinishRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.payments.verify_callback(&body.token) {
        warn!("Rejected payment callback for request {}", body.request_id);
        return Err(ApiError::Forbidden("invalid server token".to_string()));
    }

    state
        .request_repository
        .finish_payment(body.request_id, body.paid)
        .await?;

    Ok(Json(MessageResponse::new("payment recorded")))
}
