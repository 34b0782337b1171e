//! Application state shared across handlers

use auth::{JwtService, SessionManager, TokenBlacklist, repositories::UserRepository};
use common::{cache::RedisPool, storage::ImageStore};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    payment::PaymentClient,
    repositories::{MonitoringRequestRepository, ThreatRepository},
    settings::Settings,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub images: ImageStore,
    pub sessions: SessionManager,
    pub threat_repository: ThreatRepository,
    pub request_repository: MonitoringRequestRepository,
    pub payments: PaymentClient,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        redis_pool: RedisPool,
        images: ImageStore,
        jwt_service: JwtService,
        blacklist: Arc<dyn TokenBlacklist>,
        settings: &Settings,
    ) -> Self {
        Self {
            sessions: SessionManager::new(
                UserRepository::new(db_pool.clone()),
                jwt_service,
                blacklist,
            ),
            threat_repository: ThreatRepository::new(db_pool.clone(), redis_pool.clone()),
            request_repository: MonitoringRequestRepository::new(
                db_pool.clone(),
                settings.assigned_admin_id,
            ),
            payments: PaymentClient::from_settings(settings),
            db_pool,
            redis_pool,
            images,
        }
    }
}
