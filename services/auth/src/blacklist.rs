//! Revoked-token blacklist
//!
//! A logged-out token is remembered until its natural expiry so it cannot be
//! replayed. Production uses Redis under the key `jwt.<token>`; the
//! in-process variant serves tests and single-node development.

use anyhow::Result;
use async_trait::async_trait;
use common::cache::RedisPool;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::info;

const KEY_PREFIX: &str = "jwt.";

/// Cache key under which a revoked token is stored
pub fn blacklist_key(token: &str) -> String {
    format!("{}{}", KEY_PREFIX, token)
}

#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Remember `token` as revoked for `ttl`
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()>;

    /// `Ok(false)` when the token is absent; `Err` only on cache failure
    async fn is_revoked(&self, token: &str) -> Result<bool>;
}

/// Redis-backed blacklist
#[derive(Clone)]
pub struct RedisBlacklist {
    pool: RedisPool,
}

impl RedisBlacklist {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklist for RedisBlacklist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        info!("Blacklisting token for {} seconds", ttl.as_secs());
        self.pool.set(&blacklist_key(token), "true", Some(ttl)).await
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        self.pool.exists(&blacklist_key(token)).await
    }
}

/// In-process blacklist with the same TTL semantics as the Redis one
#[derive(Clone, Default)]
pub struct MemoryBlacklist {
    entries: Arc<Mutex<HashMap<String, Instant>>>,
}

impl MemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MemoryBlacklist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(blacklist_key(token), Instant::now() + ttl);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let key = blacklist_key(token);

        match entries.get(&key) {
            Some(expires) if Instant::now() < *expires => Ok(true),
            Some(_) => {
                entries.remove(&key);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
