//! Common library for the threat monitoring backend
//!
//! Shared infrastructure used by the auth and api crates: the PostgreSQL
//! pool and schema, the Redis cache, the image bucket, and the storage
//! error types.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool, migrate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     migrate(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
pub mod storage;
