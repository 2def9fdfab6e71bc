//! Admin authentication
//!
//! Policy changes and audit log access can be restricted to holders of a
//! static bearer token. Tokens are compared in constant time.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Authentication failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Authorization header must use the Bearer scheme")]
    InvalidScheme,

    #[error("Invalid admin token")]
    InvalidToken,
}

/// Check the request's `Authorization: Bearer` header against `expected`.
///
/// Passes every request when no token is configured.
pub fn authorize_admin(headers: &HeaderMap, expected: Option<&str>) -> Result<(), SecurityError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(SecurityError::MissingToken)?
        .to_str()
        .map_err(|_| SecurityError::InvalidScheme)?;

    let token = bearer_token(value).ok_or(SecurityError::InvalidScheme)?;

    if tokens_match(token, expected) {
        Ok(())
    } else {
        Err(SecurityError::InvalidToken)
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Constant-time token comparison
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
