//! Library endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        library::{CreateLibrary, Library, LibraryQuery, UpdateLibrary},
        Role,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List libraries
#[utoipa::path(
    get,
    path = "/libraries",
    tag = "libraries",
    params(LibraryQuery),
    responses(
        (status = 200, description = "Page of libraries", body = PaginatedResponse<Library>)
    )
)]
pub async fn list_libraries(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> AppResult<Json<PaginatedResponse<Library>>> {
    let (items, total, limit, offset) = state.services.libraries.list(&query).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        limit,
        offset,
    }))
}

/// Find a library by its exact name
#[utoipa::path(
    get,
    path = "/libraries/search",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(LibraryQuery),
    responses(
        (status = 200, description = "Library details", body = Library),
        (status = 400, description = "Name missing", body = crate::error::ErrorResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_library_by_name(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LibraryQuery>,
) -> AppResult<Json<Library>> {
    claims.require(Role::Staff)?;

    let name = query
        .name
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("name query parameter is required".to_string()))?;
    let library = state.services.libraries.get_by_name(name).await?;
    Ok(Json(library))
}

/// Get library details by ID
#[utoipa::path(
    get,
    path = "/libraries/{id}",
    tag = "libraries",
    params(
        ("id" = i32, Path, description = "Library ID")
    ),
    responses(
        (status = 200, description = "Library details", body = Library),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_library(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<Library>> {
    let library = state.services.libraries.get_by_id(id).await?;
    Ok(Json(library))
}

/// Create a library; its stock is filled in the background
#[utoipa::path(
    post,
    path = "/libraries",
    tag = "libraries",
    security(("bearer_auth" = [])),
    request_body = CreateLibrary,
    responses(
        (status = 201, description = "Library created", body = Library),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_library(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(library): Json<CreateLibrary>,
) -> AppResult<(StatusCode, Json<Library>)> {
    claims.require(Role::Admin)?;
    library.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let created = state.services.libraries.create(library).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a library
#[utoipa::path(
    put,
    path = "/libraries/{id}",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Library ID")
    ),
    request_body = UpdateLibrary,
    responses(
        (status = 200, description = "Library updated", body = Library),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_library(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(library): Json<UpdateLibrary>,
) -> AppResult<Json<Library>> {
    claims.require(Role::Staff)?;
    library.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let updated = state.services.libraries.update(id, library).await?;
    Ok(Json(updated))
}

/// Delete a library
#[utoipa::path(
    delete,
    path = "/libraries/{id}",
    tag = "libraries",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Library ID")
    ),
    responses(
        (status = 204, description = "Library deleted"),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Copies are on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_library(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require(Role::Admin)?;

    state.services.libraries.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
