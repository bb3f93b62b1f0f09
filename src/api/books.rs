//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookAvailability, BookQuery, CreateBook, UpdateBook},
        ledger::LedgerEntry,
        Role,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Newly catalogued book with its first stocked copy
#[derive(Serialize, ToSchema)]
pub struct CreatedBook {
    pub book: Book,
    pub stock: LedgerEntry,
}

/// Search books by title, author or ISBN
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books", body = PaginatedResponse<Book>)
    )
)]
pub async fn search_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (items, total, limit, offset) = state.services.catalog.search_books(&query).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        limit,
        offset,
    }))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Get book details by ISBN
#[utoipa::path(
    get,
    path = "/books/isbn/{isbn}",
    tag = "books",
    params(
        ("isbn" = String, Path, description = "ISBN")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book_by_isbn(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book_by_isbn(&isbn).await?;
    Ok(Json(book))
}

/// Book details with copy counts at one library
#[utoipa::path(
    get,
    path = "/books/{id}/libraries/{library_id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID"),
        ("library_id" = i32, Path, description = "Library ID")
    ),
    responses(
        (status = 200, description = "Book with copy counts", body = BookAvailability),
        (status = 404, description = "Book not found or not stocked there", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book_availability(
    State(state): State<AppState>,
    Path((id, library_id)): Path<(i32, i32)>,
) -> AppResult<Json<BookAvailability>> {
    let availability = state.services.catalog.availability(id, library_id).await?;
    Ok(Json(availability))
}

/// Catalogue a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created and one copy stocked", body = CreatedBook),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already catalogued", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<CreatedBook>)> {
    claims.require(Role::Admin)?;
    book.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let (book, stock) = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(CreatedBook { book, stock })))
}

/// Stock one more copy of a book at a library
#[utoipa::path(
    post,
    path = "/books/{id}/libraries/{library_id}/copies",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID"),
        ("library_id" = i32, Path, description = "Library ID")
    ),
    responses(
        (status = 201, description = "Copy stocked", body = LedgerEntry),
        (status = 404, description = "Book or library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, library_id)): Path<(i32, i32)>,
) -> AppResult<(StatusCode, Json<LedgerEntry>)> {
    claims.require(Role::Staff)?;

    let stock = state.services.catalog.add_copy(id, library_id).await?;
    Ok((StatusCode::CREATED, Json(stock)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(book): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require(Role::Staff)?;
    book.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let updated = state.services.catalog.update_book(id, book).await?;
    Ok(Json(updated))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Copies are on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require(Role::Admin)?;

    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
