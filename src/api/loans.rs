//! Borrow and return endpoints. Both act on the caller's own account.

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{
        loan::{LedgerResponse, LoanRequest},
        Role,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Borrow a copy from a library
#[utoipa::path(
    post,
    path = "/loans/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Book borrowed", body = LedgerResponse),
        (status = 404, description = "Book not stocked at this library", body = crate::error::ErrorResponse),
        (status = 409, description = "Already borrowed or no copies available", body = crate::error::ErrorResponse),
        (status = 503, description = "Ledger operation timed out", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<LoanRequest>,
) -> AppResult<Json<LedgerResponse>> {
    claims.require(Role::User)?;

    let stock = state
        .services
        .ledger
        .borrow(claims.user_id(), request.book_id, request.library_id)
        .await?;

    Ok(Json(LedgerResponse {
        message: "Book borrowed".to_string(),
        stock,
    }))
}

/// Return a borrowed copy to a library
#[utoipa::path(
    post,
    path = "/loans/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Book returned", body = LedgerResponse),
        (status = 404, description = "No open loan, or book not stocked at this library", body = crate::error::ErrorResponse),
        (status = 500, description = "Ledger inconsistency", body = crate::error::ErrorResponse),
        (status = 503, description = "Ledger operation timed out", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<LoanRequest>,
) -> AppResult<Json<LedgerResponse>> {
    claims.require(Role::User)?;

    let stock = state
        .services
        .ledger
        .return_book(claims.user_id(), request.book_id, request.library_id)
        .await?;

    Ok(Json(LedgerResponse {
        message: "Book returned".to_string(),
        stock,
    }))
}
