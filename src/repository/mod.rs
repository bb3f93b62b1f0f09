//! Repository layer for database operations
//!
//! The inventory ledger and the session manager only see the traits defined
//! here; [`Repository`] bundles the PostgreSQL implementations and
//! [`memory::MemoryLedgerStore`] provides an in-process ledger.

pub mod books;
pub mod ledger;
pub mod libraries;
pub mod memory;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{ledger::LedgerEntry, loan::Loan, user::NewIdentity, User},
};

/// Persistence of copy counts and loans.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open an atomic unit of work. Dropping the returned handle without
    /// calling [`LedgerTx::commit`] discards everything done through it.
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    async fn find_ledger_entry(&self, book_id: i32, library_id: i32) -> AppResult<Option<LedgerEntry>>;

    /// Add one copy (total and available) to the entry, creating it if needed
    async fn add_copy(&self, book_id: i32, library_id: i32) -> AppResult<LedgerEntry>;

    /// Any existing library, used when a new book names none
    async fn any_library_id(&self) -> AppResult<Option<i32>>;

    async fn list_book_ids(&self) -> AppResult<Vec<i32>>;

    /// Insert-only; returns false when an entry for the pair already exists
    async fn insert_ledger_entry_if_absent(&self, entry: &LedgerEntry) -> AppResult<bool>;
}

/// One unit of work against the ledger.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read an entry and hold it against concurrent writers until the unit ends
    async fn lock_ledger_entry(&mut self, book_id: i32, library_id: i32) -> AppResult<Option<LedgerEntry>>;

    /// Apply both deltas in one step. Returns `None` (and changes nothing)
    /// when the entry is missing or a counter would go negative.
    async fn adjust_ledger_entry(
        &mut self,
        book_id: i32,
        library_id: i32,
        available_delta: i32,
        borrowed_delta: i32,
    ) -> AppResult<Option<LedgerEntry>>;

    async fn find_open_loan(&mut self, user_id: i32, book_id: i32) -> AppResult<Option<Loan>>;

    async fn insert_loan(
        &mut self,
        user_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<i32>;

    async fn close_loan(&mut self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Identity lookups used to authenticate and to rehydrate claims on refresh.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_identity_by_id(&self, id: i32) -> AppResult<Option<User>>;

    async fn create_identity(&self, identity: &NewIdentity) -> AppResult<User>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub libraries: libraries::LibrariesRepository,
    pub users: users::UsersRepository,
    pub ledger: ledger::PgLedgerStore,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            libraries: libraries::LibrariesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            ledger: ledger::PgLedgerStore::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database (readiness check)
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
