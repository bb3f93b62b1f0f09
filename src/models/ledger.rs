//! Copy ledger entries: per (book, library) copy counts

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Copy counts for one book at one library.
///
/// Every persisted entry satisfies `total = available + borrowed` with both
/// parts non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LedgerEntry {
    pub book_id: i32,
    pub library_id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
    pub borrowed_copies: i32,
}

impl LedgerEntry {
    /// Fresh stock with nothing lent out
    pub fn stocked(book_id: i32, library_id: i32, total_copies: i32) -> Self {
        Self {
            book_id,
            library_id,
            total_copies,
            available_copies: total_copies,
            borrowed_copies: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.available_copies >= 0
            && self.borrowed_copies >= 0
            && self.total_copies == self.available_copies + self.borrowed_copies
    }

    /// Entry with the deltas applied, or `None` if a counter would go negative
    pub fn adjusted(&self, available_delta: i32, borrowed_delta: i32) -> Option<Self> {
        let available_copies = self.available_copies + available_delta;
        let borrowed_copies = self.borrowed_copies + borrowed_delta;
        if available_copies < 0 || borrowed_copies < 0 {
            return None;
        }
        Some(Self {
            total_copies: available_copies + borrowed_copies,
            available_copies,
            borrowed_copies,
            ..*self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjusted_keeps_total_balanced() {
        let entry = LedgerEntry::stocked(1, 1, 3);
        let borrowed = entry.adjusted(-1, 1).unwrap();
        assert_eq!(borrowed.total_copies, 3);
        assert_eq!(borrowed.available_copies, 2);
        assert_eq!(borrowed.borrowed_copies, 1);
        assert!(borrowed.is_consistent());
    }

    #[test]
    fn test_adjusted_refuses_negative_counts() {
        let entry = LedgerEntry::stocked(1, 1, 0);
        assert!(entry.adjusted(-1, 1).is_none());
        assert!(entry.adjusted(1, -1).is_none());
    }
}
