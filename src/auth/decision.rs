use axum::{http::StatusCode, response::Response};

use super::{request::AuthResult, token::TokenError};
use crate::error::{AppError, LifecycleError, json_error};

/// unauthenticated
///
/// Terminal handling for a request that needs an identity but has none. The cause is
/// logged here and nowhere else; the client only ever sees the fixed 401 body.
pub fn unauthenticated(result: &AuthResult) -> AppError {
    match result {
        AuthResult::Anonymous => tracing::warn!("Rejected request: no bearer token"),
        AuthResult::Rejected(TokenError::Expired) => tracing::warn!("Rejected request: token expired"),
        AuthResult::Rejected(TokenError::SignatureInvalid) => {
            tracing::warn!("Rejected request: token signature invalid")
        }
        AuthResult::Rejected(TokenError::Malformed(detail)) => {
            tracing::warn!(%detail, "Rejected request: token malformed")
        }
        // Only reachable if called on a successful result.
        AuthResult::Authenticated(ctx) => {
            tracing::warn!(subject = %ctx.subject, "Rejected request: authentication not accepted")
        }
    }
    AppError::Unauthenticated
}

pub fn unauthenticated_response() -> Response {
    json_error(
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        "Full authentication is required to access this resource",
    )
}

/// forbidden
///
/// Uniform 403 for ownership and role denials. The business code identifies the rule;
/// the message never says more than that access was denied.
pub fn forbidden(reason: &LifecycleError) -> Response {
    tracing::warn!(code = reason.code(), "Access denied: {}", reason);
    json_error(StatusCode::FORBIDDEN, reason.code(), "Access is denied")
}
