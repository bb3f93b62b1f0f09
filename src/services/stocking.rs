//! Initial stocking of a newly created library
//!
//! Runs detached from the request that created the library. Each catalogued
//! book gets a random number of copies; pairs that already have an entry are
//! left alone, and a failure on one book does not stop the others.

use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::{error::AppResult, models::ledger::LedgerEntry, repository::LedgerStore};

/// Outcome of one stocking run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockingReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct StockingJob {
    store: Arc<dyn LedgerStore>,
    max_copies: i32,
}

impl StockingJob {
    pub fn new(store: Arc<dyn LedgerStore>, max_copies: i32) -> Self {
        Self {
            store,
            max_copies: max_copies.max(1),
        }
    }

    /// Start stocking `library_id` in the background
    pub fn spawn(&self, library_id: i32) -> JoinHandle<()> {
        let job = self.clone();
        tokio::spawn(async move {
            match job.run(library_id).await {
                Ok(report) => tracing::info!(
                    target: "stocking",
                    library_id,
                    inserted = report.inserted,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Library stocked"
                ),
                Err(e) => tracing::error!(target: "stocking", library_id, "Stocking aborted: {}", e),
            }
        })
    }

    pub async fn run(&self, library_id: i32) -> AppResult<StockingReport> {
        let book_ids = self.store.list_book_ids().await?;
        let mut report = StockingReport::default();

        for book_id in book_ids {
            let entry = LedgerEntry::stocked(book_id, library_id, self.draw_copies());
            match self.store.insert_ledger_entry_if_absent(&entry).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(target: "stocking", library_id, book_id, "Failed to stock book: {}", e);
                }
            }
        }

        Ok(report)
    }

    fn draw_copies(&self) -> i32 {
        rand::thread_rng().gen_range(1..=self.max_copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryLedgerStore;

    #[tokio::test]
    async fn test_copies_stay_within_bounds() {
        let store = MemoryLedgerStore::new();
        for book_id in 1..=50 {
            store.add_book(book_id).await;
        }

        let report = StockingJob::new(Arc::new(store.clone()), 4).run(9).await.unwrap();

        assert_eq!(report.inserted, 50);
        for entry in store.entries().await {
            assert!((1..=4).contains(&entry.total_copies));
            assert_eq!(entry.available_copies, entry.total_copies);
            assert_eq!(entry.borrowed_copies, 0);
        }
    }

    #[tokio::test]
    async fn test_non_positive_maximum_still_stocks_one_copy() {
        let store = MemoryLedgerStore::new();
        store.add_book(1).await;

        StockingJob::new(Arc::new(store.clone()), 0).run(2).await.unwrap();

        assert_eq!(store.entries().await, vec![LedgerEntry::stocked(1, 2, 1)]);
    }
}
