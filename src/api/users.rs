//! User management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::LoanedBook,
        library::Library,
        user::{CreateUser, EmailQuery, UpdateUser},
        Role, User,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Home library selection
#[derive(Deserialize, ToSchema)]
pub struct HomeLibraryRequest {
    pub library_id: i32,
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 403, description = "Not the caller and not staff", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_self_or(id, Role::Staff)?;

    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Find a user by email
#[utoipa::path(
    get,
    path = "/users/search",
    tag = "users",
    security(("bearer_auth" = [])),
    params(EmailQuery),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<EmailQuery>,
) -> AppResult<Json<User>> {
    claims.require(Role::Staff)?;

    let user = state.services.users.get_by_email(&query.email).await?;
    Ok(Json(user))
}

/// Create a user with any role
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require(Role::Admin)?;
    user.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let created = state.services.users.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(user): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    claims.require(Role::Staff)?;
    if user.role.is_some() {
        claims.require(Role::Admin)?;
    }
    user.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let target = state.services.users.get_by_id(id).await?;
    claims.require_manager_of(target.role)?;

    let updated = state.services.users.update_user(id, user).await?;
    Ok(Json(updated))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "User still holds books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require(Role::Admin)?;

    state.services.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Books the user currently holds
#[utoipa::path(
    get,
    path = "/users/{id}/borrowed",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanedBook>)
    )
)]
pub async fn borrowed_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanedBook>>> {
    claims.require_self_or(id, Role::Staff)?;

    let books = state.services.users.borrowed_books(id).await?;
    Ok(Json(books))
}

/// Recently returned books
#[utoipa::path(
    get,
    path = "/users/{id}/returned",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Closed loans, newest first", body = Vec<LoanedBook>)
    )
)]
pub async fn returned_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanedBook>>> {
    claims.require_self_or(id, Role::Staff)?;

    let books = state.services.users.returned_books(id).await?;
    Ok(Json(books))
}

/// Get the user's home library
#[utoipa::path(
    get,
    path = "/users/{id}/home-library",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Home library, null when unset", body = Library)
    )
)]
pub async fn home_library(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Option<Library>>> {
    claims.require_self_or(id, Role::Staff)?;

    let library = state.services.users.home_library(id).await?;
    Ok(Json(library))
}

/// Set the user's home library
#[utoipa::path(
    put,
    path = "/users/{id}/home-library",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = HomeLibraryRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User or library not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_home_library(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<HomeLibraryRequest>,
) -> AppResult<Json<User>> {
    claims.require_self_or(id, Role::Staff)?;

    let user = state.services.users.set_home_library(id, request.library_id).await?;
    Ok(Json(user))
}
