//! Data models for Libris

pub mod book;
pub mod ledger;
pub mod library;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use ledger::LedgerEntry;
pub use library::Library;
pub use loan::Loan;
pub use user::{Role, SessionUser, User, UserClaims};
