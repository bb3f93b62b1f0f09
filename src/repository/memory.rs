//! In-process ledger store.
//!
//! A single async mutex guards the whole state. A unit of work holds the
//! lock for its lifetime and edits a staged copy, which replaces the shared
//! state on commit; dropping the unit discards the copy.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTx};
use crate::{
    error::{AppError, AppResult},
    models::{ledger::LedgerEntry, loan::Loan},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    entries: BTreeMap<(i32, i32), LedgerEntry>,
    loans: Vec<Loan>,
    book_ids: BTreeSet<i32>,
    library_ids: BTreeSet<i32>,
    next_loan_id: i32,
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_book(&self, book_id: i32) {
        self.state.lock().await.book_ids.insert(book_id);
    }

    pub async fn add_library(&self, library_id: i32) {
        self.state.lock().await.library_ids.insert(library_id);
    }

    /// Seed an entry, registering its book and library
    pub async fn put_entry(&self, entry: LedgerEntry) {
        let mut state = self.state.lock().await;
        state.book_ids.insert(entry.book_id);
        state.library_ids.insert(entry.library_id);
        state.entries.insert((entry.book_id, entry.library_id), entry);
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.values().copied().collect()
    }

    pub async fn loans(&self) -> Vec<Loan> {
        self.state.lock().await.loans.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, staged }))
    }

    async fn find_ledger_entry(&self, book_id: i32, library_id: i32) -> AppResult<Option<LedgerEntry>> {
        Ok(self.state.lock().await.entries.get(&(book_id, library_id)).copied())
    }

    async fn add_copy(&self, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        let mut state = self.state.lock().await;
        state.book_ids.insert(book_id);
        state.library_ids.insert(library_id);
        let entry = state
            .entries
            .entry((book_id, library_id))
            .or_insert_with(|| LedgerEntry::stocked(book_id, library_id, 0));
        entry.total_copies += 1;
        entry.available_copies += 1;
        Ok(*entry)
    }

    async fn any_library_id(&self) -> AppResult<Option<i32>> {
        Ok(self.state.lock().await.library_ids.iter().next().copied())
    }

    async fn list_book_ids(&self) -> AppResult<Vec<i32>> {
        Ok(self.state.lock().await.book_ids.iter().copied().collect())
    }

    async fn insert_ledger_entry_if_absent(&self, entry: &LedgerEntry) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let key = (entry.book_id, entry.library_id);
        if state.entries.contains_key(&key) {
            return Ok(false);
        }
        state.entries.insert(key, *entry);
        Ok(true)
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_ledger_entry(&mut self, book_id: i32, library_id: i32) -> AppResult<Option<LedgerEntry>> {
        Ok(self.staged.entries.get(&(book_id, library_id)).copied())
    }

    async fn adjust_ledger_entry(
        &mut self,
        book_id: i32,
        library_id: i32,
        available_delta: i32,
        borrowed_delta: i32,
    ) -> AppResult<Option<LedgerEntry>> {
        let Some(entry) = self.staged.entries.get_mut(&(book_id, library_id)) else {
            return Ok(None);
        };
        let Some(adjusted) = entry.adjusted(available_delta, borrowed_delta) else {
            return Ok(None);
        };
        *entry = adjusted;
        Ok(Some(adjusted))
    }

    async fn find_open_loan(&mut self, user_id: i32, book_id: i32) -> AppResult<Option<Loan>> {
        Ok(self
            .staged
            .loans
            .iter()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.is_open())
            .cloned())
    }

    async fn insert_loan(
        &mut self,
        user_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<i32> {
        if self
            .staged
            .loans
            .iter()
            .any(|l| l.user_id == user_id && l.book_id == book_id && l.is_open())
        {
            return Err(AppError::AlreadyBorrowed { user_id, book_id });
        }
        self.staged.next_loan_id += 1;
        let id = self.staged.next_loan_id;
        self.staged.loans.push(Loan {
            id,
            user_id,
            book_id,
            due_date,
            borrowed_at,
            returned_at: None,
        });
        Ok(id)
    }

    async fn close_loan(&mut self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<()> {
        let loan = self
            .staged
            .loans
            .iter_mut()
            .find(|l| l.id == loan_id && l.is_open())
            .ok_or_else(|| AppError::InconsistentState(format!("loan {} is not open", loan_id)))?;
        loan.returned_at = Some(returned_at);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedgerTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
