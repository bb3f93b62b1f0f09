//! PostgreSQL ledger store: copy counts in `library_stock`, loans in `loans`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{LedgerStore, LedgerTx};
use crate::{
    error::{AppError, AppResult},
    models::{ledger::LedgerEntry, loan::Loan},
};

const ENTRY_COLUMNS: &str = "book_id, library_id, total_copies, available_copies, borrowed_copies";

/// Partial unique index guaranteeing one open loan per (user, book)
const OPEN_LOAN_INDEX: &str = "loans_one_open_per_user_book";

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Pool<Postgres>,
}

impl PgLedgerStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn find_ledger_entry(&self, book_id: i32, library_id: i32) -> AppResult<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {} FROM library_stock WHERE book_id = $1 AND library_id = $2",
            ENTRY_COLUMNS
        ))
        .bind(book_id)
        .bind(library_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn add_copy(&self, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO library_stock (book_id, library_id, total_copies, available_copies, borrowed_copies)
            VALUES ($1, $2, 1, 1, 0)
            ON CONFLICT (book_id, library_id) DO UPDATE
            SET total_copies = library_stock.total_copies + 1,
                available_copies = library_stock.available_copies + 1
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(book_id)
        .bind(library_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn any_library_id(&self) -> AppResult<Option<i32>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM libraries ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_book_ids(&self) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT id FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn insert_ledger_entry_if_absent(&self, entry: &LedgerEntry) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO library_stock (book_id, library_id, total_copies, available_copies, borrowed_copies)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (book_id, library_id) DO NOTHING
            "#,
        )
        .bind(entry.book_id)
        .bind(entry.library_id)
        .bind(entry.total_copies)
        .bind(entry.available_copies)
        .bind(entry.borrowed_copies)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Ledger unit of work backed by a database transaction.
/// `sqlx` rolls the transaction back when it is dropped uncommitted.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_ledger_entry(&mut self, book_id: i32, library_id: i32) -> AppResult<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {} FROM library_stock WHERE book_id = $1 AND library_id = $2 FOR UPDATE",
            ENTRY_COLUMNS
        ))
        .bind(book_id)
        .bind(library_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn adjust_ledger_entry(
        &mut self,
        book_id: i32,
        library_id: i32,
        available_delta: i32,
        borrowed_delta: i32,
    ) -> AppResult<Option<LedgerEntry>> {
        // Conditional update: a failed guard matches no row instead of
        // tripping the CHECK constraints.
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            UPDATE library_stock
            SET available_copies = available_copies + $3,
                borrowed_copies = borrowed_copies + $4,
                total_copies = total_copies + $3 + $4
            WHERE book_id = $1 AND library_id = $2
              AND available_copies + $3 >= 0
              AND borrowed_copies + $4 >= 0
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(book_id)
        .bind(library_id)
        .bind(available_delta)
        .bind(borrowed_delta)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn find_open_loan(&mut self, user_id: i32, book_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, user_id, book_id, due_date, borrowed_at, returned_at
            FROM loans
            WHERE user_id = $1 AND book_id = $2 AND returned_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn insert_loan(
        &mut self,
        user_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<i32> {
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO loans (user_id, book_id, due_date, borrowed_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(due_date)
        .bind(borrowed_at)
        .fetch_one(&mut *self.tx)
        .await;

        match result {
            Ok(id) => Ok(id),
            // Lost a race against a borrow of the same book at another library
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(OPEN_LOAN_INDEX) => {
                Err(AppError::AlreadyBorrowed { user_id, book_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close_loan(&mut self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query("UPDATE loans SET returned_at = $1 WHERE id = $2 AND returned_at IS NULL")
            .bind(returned_at)
            .bind(loan_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::InconsistentState(format!(
                "loan {} vanished or was closed while locked",
                loan_id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
