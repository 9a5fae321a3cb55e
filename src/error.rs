use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::{decision, token::TokenError};

/// Resource
///
/// The kind of record a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Member,
    Board,
    Comment,
}

/// LifecycleError
///
/// Business failures raised by the policy and the lifecycle transitions. The variant
/// decides the status code; the business code string identifies the rule that fired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{0:?} not found")]
    NotFound(Resource),
    /// Ownership denial: the caller is not the author (or an admin, where admins are allowed).
    #[error("requester is not allowed to access this resource")]
    Unauthorized,
    /// Role/status denial: the caller is not an admin, or is not ACTIVE.
    #[error("member is not allowed to perform this action")]
    MemberForbidden,
    #[error("board can no longer be changed")]
    CannotChangeBoard,
    #[error("a comment can only be left on a question that is waiting for an answer")]
    CannotLeaveComment,
    #[error("member already exists")]
    MemberExists,
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(Resource::Member) => "MEMBER_NOT_FOUND",
            Self::NotFound(Resource::Board) => "BOARD_NOT_FOUND",
            Self::NotFound(Resource::Comment) => "COMMENT_NOT_FOUND",
            Self::Unauthorized => "BOARD_UNAUTHORIZED",
            Self::MemberForbidden => "MEMBER_FORBIDDEN",
            Self::CannotChangeBoard => "CANNOT_CHANGE_BOARD",
            Self::CannotLeaveComment => "CANNOT_LEAVE_COMMENT",
            Self::MemberExists => "MEMBER_EXISTS",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::MemberForbidden => StatusCode::FORBIDDEN,
            Self::CannotChangeBoard | Self::CannotLeaveComment => StatusCode::BAD_REQUEST,
            Self::MemberExists => StatusCode::CONFLICT,
        }
    }
}

/// Unique constraint on `members.email`.
pub const MEMBER_EMAIL_KEY: &str = "members_email_key";
/// Unique constraint on `comments.board_id`: at most one answer per board.
pub const BOARD_ANSWER_KEY: &str = "comments_board_id_key";

/// StoreError
///
/// What a repository call can fail with. `Rejected` carries a business denial raised
/// inside the atomic read-check-write; `Conflict` names the unique constraint that was
/// violated; `Database` is any other infrastructure failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Rejected(#[from] LifecycleError),
    #[error("unique constraint {constraint} violated")]
    Conflict { constraint: String },
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::Conflict {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        Self::Database(e.to_string())
    }
}

/// AppError
///
/// Every failure a handler can return. Implements `IntoResponse` so handlers can
/// propagate with `?` and still produce the uniform error payload.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Rejected(reason) => Self::Lifecycle(reason),
            StoreError::Conflict { constraint } => match constraint.as_str() {
                MEMBER_EMAIL_KEY => Self::Lifecycle(LifecycleError::MemberExists),
                BOARD_ANSWER_KEY => Self::Lifecycle(LifecycleError::CannotLeaveComment),
                other => Self::Internal(format!("unexpected unique violation on {other}")),
            },
            StoreError::Database(detail) => Self::Internal(detail),
        }
    }
}

/// ErrorBody
///
/// The JSON payload every error response carries.
#[derive(Debug, Serialize, serde::Deserialize, ToSchema, PartialEq)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub code: String,
    pub message: String,
}

pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    let error = match status {
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
        StatusCode::FORBIDDEN => "FORBIDDEN",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::CONFLICT => "CONFLICT",
        _ => "INTERNAL_SERVER_ERROR",
    };
    let body = ErrorBody {
        status: status.as_u16(),
        error: error.to_string(),
        code: code.to_string(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => decision::unauthenticated_response(),
            Self::InvalidCredentials => json_error(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Email or password is incorrect",
            ),
            Self::Lifecycle(reason @ (LifecycleError::Unauthorized | LifecycleError::MemberForbidden)) => {
                decision::forbidden(&reason)
            }
            Self::Lifecycle(reason) => json_error(reason.status(), reason.code(), &reason.to_string()),
            Self::BadRequest(message) => json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", &message),
            Self::Token(e) => {
                tracing::error!("Token encoding error: {:?}", e);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", "Internal server error")
            }
            Self::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", "Internal server error")
            }
        }
    }
}
