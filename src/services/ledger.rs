//! Inventory ledger: borrow and return as atomic state transitions
//!
//! Every operation runs inside one unit of work opened on the
//! [`LedgerStore`]. The ledger row is locked first, so borrows and returns
//! against the same `(book, library)` pair serialize. Any early return drops
//! the unit uncommitted, leaving counts and loans untouched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::{
    config::LedgerConfig,
    error::{AppError, AppResult},
    models::ledger::LedgerEntry,
    repository::LedgerStore,
};

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Lend one copy of `book_id` at `library_id` to `user_id`
    pub async fn borrow(&self, user_id: i32, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let entry = self
            .run("borrow", || self.try_borrow(user_id, book_id, library_id))
            .await?;
        tracing::info!(
            user_id,
            book_id,
            library_id,
            available = entry.available_copies,
            "Book borrowed"
        );
        Ok(entry)
    }

    /// Take back the copy of `book_id` that `user_id` holds, crediting `library_id`
    pub async fn return_book(&self, user_id: i32, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let entry = self
            .run("return", || self.try_return(user_id, book_id, library_id))
            .await?;
        tracing::info!(
            user_id,
            book_id,
            library_id,
            available = entry.available_copies,
            "Book returned"
        );
        Ok(entry)
    }

    /// Library that receives a new book's first copy: the requested one,
    /// else an arbitrary existing library.
    pub async fn target_library(&self, library_id: Option<i32>) -> AppResult<i32> {
        match library_id {
            Some(id) => Ok(id),
            None => self
                .store
                .any_library_id()
                .await?
                .ok_or_else(|| AppError::Validation("No library exists to receive the copy".to_string())),
        }
    }

    /// Add one copy (total and available) of an existing book at a library
    pub async fn stock_new_copy(&self, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let entry = self.store.add_copy(book_id, library_id).await?;
        tracing::debug!(book_id, library_id, total = entry.total_copies, "Copy stocked");
        Ok(entry)
    }

    /// Current counts for a pair
    pub async fn entry(&self, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        self.store
            .find_ledger_entry(book_id, library_id)
            .await?
            .ok_or(AppError::NotStocked { book_id, library_id })
    }

    async fn try_borrow(&self, user_id: i32, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let mut tx = self.store.begin().await?;

        let entry = tx
            .lock_ledger_entry(book_id, library_id)
            .await?
            .filter(|e| e.total_copies > 0)
            .ok_or(AppError::NotStocked { book_id, library_id })?;

        // A user holds at most one copy of a title, whichever library lent it
        if tx.find_open_loan(user_id, book_id).await?.is_some() {
            return Err(AppError::AlreadyBorrowed { user_id, book_id });
        }

        if entry.available_copies < 1 {
            return Err(AppError::NoCopiesAvailable { book_id, library_id });
        }

        let updated = tx
            .adjust_ledger_entry(book_id, library_id, -1, 1)
            .await?
            .ok_or(AppError::NoCopiesAvailable { book_id, library_id })?;
        if !updated.is_consistent() {
            return Err(AppError::InconsistentState(format!(
                "borrow left book {} at library {} with {}/{}/{} total/available/borrowed",
                book_id, library_id, updated.total_copies, updated.available_copies, updated.borrowed_copies
            )));
        }

        let borrowed_at = Utc::now();
        let due_date = borrowed_at + chrono::Duration::days(self.config.loan_duration_days);
        tx.insert_loan(user_id, book_id, due_date, borrowed_at).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn try_return(&self, user_id: i32, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let mut tx = self.store.begin().await?;

        let entry = tx.lock_ledger_entry(book_id, library_id).await?;
        let loan = tx
            .find_open_loan(user_id, book_id)
            .await?
            .ok_or(AppError::NoOpenLoan { user_id, book_id })?;
        let Some(entry) = entry else {
            tracing::warn!(
                loan_id = loan.id,
                user_id,
                book_id,
                library_id,
                "Return refused: open loan credited to a library that does not stock the book"
            );
            return Err(AppError::NotStocked { book_id, library_id });
        };

        if entry.borrowed_copies < 1 {
            return Err(AppError::InconsistentState(format!(
                "open loan {} for book {} but library {} shows no borrowed copies",
                loan.id, book_id, library_id
            )));
        }

        tx.close_loan(loan.id, Utc::now()).await?;
        let updated = tx
            .adjust_ledger_entry(book_id, library_id, 1, -1)
            .await?
            .ok_or_else(|| {
                AppError::InconsistentState(format!(
                    "could not credit book {} back to library {}",
                    book_id, library_id
                ))
            })?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Run one attempt per call of `attempt`, retrying serialization
    /// conflicts, all within the configured deadline.
    async fn run<F, Fut>(&self, operation: &'static str, attempt: F) -> AppResult<LedgerEntry>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<LedgerEntry>>,
    {
        let deadline = Duration::from_millis(self.config.operation_timeout_ms);
        let result = tokio::time::timeout(deadline, self.retrying(operation, attempt))
            .await
            .map_err(|_| {
                tracing::warn!(operation, timeout_ms = self.config.operation_timeout_ms, "Ledger operation timed out");
                AppError::Timeout(format!("{} did not finish within {} ms", operation, self.config.operation_timeout_ms))
            })?;

        if let Err(AppError::InconsistentState(msg)) = &result {
            tracing::error!(operation, "Ledger invariant violated: {}", msg);
        }
        result
    }

    async fn retrying<F, Fut>(&self, operation: &'static str, mut attempt: F) -> AppResult<LedgerEntry>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<LedgerEntry>>,
    {
        let mut retries = 0u32;
        loop {
            match attempt().await {
                Err(e) if e.is_serialization_conflict() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!(operation, retries, "Serialization conflict, retrying");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(retries))).await;
                }
                other => return other,
            }
        }
    }
}
