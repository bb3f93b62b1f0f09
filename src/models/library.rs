//! Library (branch) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Library record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Library {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub street_address: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create library request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLibrary {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
}

/// Update library request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateLibrary {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub city: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// Library listing query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct LibraryQuery {
    /// Exact (case-insensitive) name lookup
    pub name: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
