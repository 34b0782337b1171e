use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{AppState, Settings, create_router};
use auth::{JwtConfig, JwtService, RedisBlacklist};
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, migrate},
    storage::{ImageStore, StorageConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting threat monitoring API");

    let settings = Settings::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    migrate(&pool).await?;

    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let images = ImageStore::connect(&StorageConfig::from_env()).await?;
    let blacklist = Arc::new(RedisBlacklist::new(redis_pool.clone()));

    if settings.assigned_admin_id.is_none() {
        info!("No APP_ASSIGNED_ADMIN_ID set, new drafts start without an admin");
    }

    let app_state = AppState::new(pool, redis_pool, images, jwt_service, blacklist, &settings);

    // Start the web server
    let app = create_router(app_state);

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
