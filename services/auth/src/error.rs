//! Errors raised by the credential and session operations

use common::error::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("a user with login {0} already exists")]
    DuplicateLogin(String),

    #[error("invalid login or password")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token blacklist unavailable: {0}")]
    Blacklist(anyhow::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type AuthResult<T> = Result<T, AuthError>;
