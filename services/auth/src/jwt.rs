//! JWT service for token generation and validation
//!
//! Tokens are HS256-signed and carry the user id, the admin flag, the issue
//! time and an expiry one token lifetime later. The same lifetime bounds how
//! long a revoked token stays on the blacklist.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default token lifetime: one hour
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3600;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for signing and verifying tokens
    pub secret: String,
    /// Token lifetime in seconds
    pub ttl_seconds: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TOKEN_SECRET`: HMAC secret (required, non-empty)
    /// - `JWT_TTL_SECONDS`: token lifetime in seconds (default: 3600)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("TOKEN_SECRET")
            .map_err(|_| anyhow::anyhow!("TOKEN_SECRET environment variable not set"))?;

        let ttl_seconds = std::env::var("JWT_TTL_SECONDS")
            .unwrap_or_else(|_| DEFAULT_TOKEN_TTL_SECONDS.to_string())
            .parse()
            .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);

        Ok(JwtConfig {
            secret,
            ttl_seconds,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    pub is_admin: bool,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            anyhow::bail!("empty signing key");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: Duration::from_secs(config.ttl_seconds),
        })
    }

    /// Sign a token for the given user
    pub fn issue(&self, user_id: i64, is_admin: bool) -> Result<String, jsonwebtoken::errors::Error> {
        let now = unix_now();
        let claims = Claims {
            sub: user_id,
            is_admin,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn parse(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Token lifetime, also used as the blacklist TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
