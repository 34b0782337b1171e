//! User repository for database operations

use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::info;

use crate::models::User;

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a client account; a taken login fails with a unique violation
    pub async fn create(&self, login: &str, password_hash: &str) -> DatabaseResult<User> {
        info!("Creating new user: {}", login);

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (login, password_hash, is_admin, registration_date)
            VALUES ($1, $2, FALSE, NOW())
            RETURNING id, login, password_hash, is_admin, registration_date
            "#,
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Find a user by login
    pub async fn find_by_login(&self, login: &str) -> DatabaseResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password_hash, is_admin, registration_date
            FROM users
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password_hash, is_admin, registration_date
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }
}
