//! Credential & session component
//!
//! Password hashing, JWT issue and validation, the revoked-token blacklist,
//! and the role policy evaluated by the HTTP access interceptor.

pub mod access;
pub mod blacklist;
pub mod error;
pub mod jwt;
pub mod models;
pub mod password;
pub mod repositories;
pub mod session;
pub mod validation;

pub use access::{Access, AccessError, Authenticated, BearerToken, Identity, Role};
pub use blacklist::{MemoryBlacklist, RedisBlacklist, TokenBlacklist};
pub use error::{AuthError, AuthResult};
pub use jwt::{JwtConfig, JwtService};
pub use session::{SessionManager, SignedIn};
