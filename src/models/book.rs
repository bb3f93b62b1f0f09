//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::ledger::LedgerEntry;

/// Book record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub thumbnail: String,
    pub edition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book together with its copy counts at one library
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookAvailability {
    pub book: Book,
    pub stock: LedgerEntry,
}

/// Book in a user's loan history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanedBook {
    pub loan_id: i32,
    pub book_id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub due_date: DateTime<Utc>,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10 to 17 characters"))]
    pub isbn: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub edition: String,
    /// Library receiving the first copy; any existing library when omitted
    pub library_id: Option<i32>,
}

/// Update book request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10 to 17 characters"))]
    pub isbn: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub thumbnail: Option<String>,
    pub edition: Option<String>,
}

/// Field a catalog search matches against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    Title,
    Author,
    Isbn,
}

/// Book search query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Text to search for (case-insensitive substring)
    pub q: String,
    #[serde(default)]
    pub by: SearchField,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
