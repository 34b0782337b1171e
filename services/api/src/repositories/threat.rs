//! Catalog repository
//!
//! The active catalog is cached as one JSON document under [`THREATS_CACHE_KEY`]
//! and filtered in process. Every write drops the key.

use common::{cache::RedisPool, error::DatabaseError};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    Threat, ThreatDraft, ThreatPatch,
    threat::ThreatFilter,
};

pub const THREATS_CACHE_KEY: &str = "threats";
pub const THREATS_CACHE_TTL: Duration = Duration::from_secs(3600);

const SELECT_THREAT: &str = r#"
    SELECT id, name, description, summary, image, count, price, is_deleted
    FROM threats
"#;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("threat {0} not found")]
    NotFound(i64),

    #[error("threat cache unavailable: {0}")]
    Cache(anyhow::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl CatalogError {
    /// Writes hit the database before the cache key is dropped, so a cache
    /// failure means the row was stored anyway
    pub fn row_written(&self) -> bool {
        matches!(self, CatalogError::Cache(_))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Threat repository
#[derive(Clone)]
pub struct ThreatRepository {
    pool: PgPool,
    cache: RedisPool,
}

impl ThreatRepository {
    /// Create a new threat repository
    pub fn new(pool: PgPool, cache: RedisPool) -> Self {
        Self { pool, cache }
    }

    /// Active items matching the filter, in id order
    pub async fn list(&self, filter: &ThreatFilter) -> CatalogResult<Vec<Threat>> {
        Ok(self
            .active()
            .await?
            .into_iter()
            .filter(|threat| threat.matches(filter))
            .collect())
    }

    async fn active(&self) -> CatalogResult<Vec<Threat>> {
        if let Some(cached) = self
            .cache
            .get(THREATS_CACHE_KEY)
            .await
            .map_err(CatalogError::Cache)?
        {
            match serde_json::from_str(&cached) {
                Ok(threats) => return Ok(threats),
                Err(e) => warn!("Discarding unreadable threat cache: {}", e),
            }
        }

        let threats = sqlx::query_as::<_, Threat>(&format!(
            "{} WHERE is_deleted = FALSE ORDER BY id",
            SELECT_THREAT
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let payload =
            serde_json::to_string(&threats).map_err(|e| CatalogError::Cache(e.into()))?;
        self.cache
            .set(THREATS_CACHE_KEY, &payload, Some(THREATS_CACHE_TTL))
            .await
            .map_err(CatalogError::Cache)?;

        Ok(threats)
    }

    /// Lookup by id; soft-deleted items are still returned
    pub async fn get_by_id(&self, id: i64) -> CatalogResult<Threat> {
        sqlx::query_as::<_, Threat>(&format!("{} WHERE id = $1", SELECT_THREAT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?
            .ok_or(CatalogError::NotFound(id))
    }

    pub async fn create(&self, draft: &ThreatDraft) -> CatalogResult<Threat> {
        let threat = sqlx::query_as::<_, Threat>(
            r#"
            INSERT INTO threats (name, description, summary, image, count, price, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING id, name, description, summary, image, count, price, is_deleted
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.summary)
        .bind(&draft.image)
        .bind(draft.count)
        .bind(draft.price)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        info!("Created threat {} ({})", threat.id, threat.name);
        self.invalidate().await?;
        Ok(threat)
    }

    /// Apply a partial update. Returns the stored item before and after.
    pub async fn update(&self, id: i64, patch: ThreatPatch) -> CatalogResult<(Threat, Threat)> {
        let previous = self.get_by_id(id).await?;
        let mut next = previous.clone();
        patch.apply(&mut next);

        let updated = sqlx::query_as::<_, Threat>(
            r#"
            UPDATE threats
            SET name = $2, description = $3, summary = $4, image = $5, count = $6, price = $7
            WHERE id = $1
            RETURNING id, name, description, summary, image, count, price, is_deleted
            "#,
        )
        .bind(id)
        .bind(&next.name)
        .bind(&next.description)
        .bind(&next.summary)
        .bind(&next.image)
        .bind(next.count)
        .bind(next.price)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?
        .ok_or(CatalogError::NotFound(id))?;

        info!("Updated threat {}", id);
        self.invalidate().await?;
        Ok((previous, updated))
    }

    /// Flag an item as deleted
    pub async fn soft_delete(&self, id: i64) -> CatalogResult<()> {
        let result = sqlx::query(
            "UPDATE threats SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }

        info!("Soft-deleted threat {}", id);
        self.invalidate().await
    }

    async fn invalidate(&self) -> CatalogResult<()> {
        self.cache
            .delete(THREATS_CACHE_KEY)
            .await
            .map_err(CatalogError::Cache)
    }
}
