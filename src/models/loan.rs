//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ledger::LedgerEntry;

/// Loan record; open while `returned_at` is null
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub due_date: DateTime<Utc>,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Borrow or return request; the borrower is the authenticated caller
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct LoanRequest {
    pub book_id: i32,
    pub library_id: i32,
}

/// Borrow/return response carrying the refreshed ledger entry
#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerResponse {
    pub message: String,
    pub stock: LedgerEntry,
}
