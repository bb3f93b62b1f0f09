//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NoSuchData = 5,
    BadValue = 6,
    Duplicate = 7,
    NotStocked = 8,
    AlreadyBorrowed = 9,
    NoCopiesAvailable = 10,
    NoOpenLoan = 11,
    InconsistentState = 12,
    TokenExpired = 13,
    InvalidIssuer = 14,
    Timeout = 15,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Book {book_id} is not stocked at library {library_id}")]
    NotStocked { book_id: i32, library_id: i32 },

    #[error("User {user_id} already holds an open loan for book {book_id}")]
    AlreadyBorrowed { user_id: i32, book_id: i32 },

    #[error("No copies of book {book_id} are available at library {library_id}")]
    NoCopiesAvailable { book_id: i32, library_id: i32 },

    #[error("User {user_id} has no open loan for book {book_id}")]
    NoOpenLoan { user_id: i32, book_id: i32 },

    #[error("Ledger inconsistency: {0}")]
    InconsistentState(String),

    #[error("No credential presented: {0}")]
    MissingCredential(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token issuer is not trusted")]
    InvalidIssuer,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Infrastructure failures a caller may retry with backoff.
    /// Business-rule, authentication and validation errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Timeout(_))
    }

    /// Serialization failure or deadlock reported by PostgreSQL
    pub fn is_serialization_conflict(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }

    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::NotStocked { .. } => (StatusCode::NOT_FOUND, ErrorCode::NotStocked),
            AppError::AlreadyBorrowed { .. } => (StatusCode::CONFLICT, ErrorCode::AlreadyBorrowed),
            AppError::NoCopiesAvailable { .. } => {
                (StatusCode::CONFLICT, ErrorCode::NoCopiesAvailable)
            }
            AppError::NoOpenLoan { .. } => (StatusCode::NOT_FOUND, ErrorCode::NoOpenLoan),
            AppError::InconsistentState(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InconsistentState)
            }
            AppError::MissingCredential(_) | AppError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated)
            }
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, ErrorCode::TokenExpired),
            AppError::InvalidIssuer => (StatusCode::UNAUTHORIZED, ErrorCode::InvalidIssuer),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Timeout),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::InconsistentState(msg) => {
                tracing::error!("Ledger inconsistency surfaced to client: {}", msg);
                "Inventory ledger is in an inconsistent state".to_string()
            }
            AppError::Timeout(msg) => {
                tracing::warn!("Operation timed out: {}", msg);
                self.to_string()
            }
            AppError::MissingCredential(_)
            | AppError::TokenExpired
            | AppError::InvalidIssuer
            | AppError::Authentication(_)
            | AppError::Authorization(_) => {
                tracing::debug!("Rejected request: {}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_map_to_distinct_statuses() {
        let cases = [
            (AppError::NotStocked { book_id: 1, library_id: 2 }, StatusCode::NOT_FOUND),
            (AppError::AlreadyBorrowed { user_id: 1, book_id: 2 }, StatusCode::CONFLICT),
            (AppError::NoCopiesAvailable { book_id: 1, library_id: 2 }, StatusCode::CONFLICT),
            (AppError::NoOpenLoan { user_id: 1, book_id: 2 }, StatusCode::NOT_FOUND),
            (AppError::InconsistentState("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_authentication_and_authorization_differ() {
        assert_eq!(
            AppError::MissingCredential("none".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::TokenExpired.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Authorization("role".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_only_infrastructure_errors_are_retryable() {
        assert!(AppError::Timeout("borrow".into()).is_retryable());
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::NoCopiesAvailable { book_id: 1, library_id: 1 }.is_retryable());
        assert!(!AppError::TokenExpired.is_retryable());
    }
}
