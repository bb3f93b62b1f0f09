//! API handlers for Libris REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod libraries;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for the verified claims of the caller.
///
/// A `Bearer` access token wins; without an `Authorization` header the
/// refresh cookie is used.
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = &state.services.session;

        if let Some(header) = parts.headers.get(AUTHORIZATION) {
            let token = header
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;
            return Ok(AuthenticatedUser(session.verify_access_token(token.trim())?));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        Ok(AuthenticatedUser(session.verify_and_extract(&jar)?))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of matches
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .merge(login_routes(&state))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Users
        .route("/users", post(users::create_user))
        .route("/users/search", get(users::get_user_by_email))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/:id/borrowed", get(users::borrowed_books))
        .route("/users/:id/returned", get(users::returned_books))
        .route("/users/:id/home-library", get(users::home_library))
        .route("/users/:id/home-library", put(users::set_home_library))
        // Books
        .route("/books", get(books::search_books))
        .route("/books", post(books::create_book))
        .route("/books/isbn/:isbn", get(books::get_book_by_isbn))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id", put(books::update_book))
        .route("/books/:id", delete(books::delete_book))
        .route("/books/:id/libraries/:library_id", get(books::get_book_availability))
        .route("/books/:id/libraries/:library_id/copies", post(books::add_copy))
        // Libraries
        .route("/libraries", get(libraries::list_libraries))
        .route("/libraries", post(libraries::create_library))
        .route("/libraries/search", get(libraries::get_library_by_name))
        .route("/libraries/:id", get(libraries::get_library))
        .route("/libraries/:id", put(libraries::update_library))
        .route("/libraries/:id", delete(libraries::delete_library))
        // Borrow / return
        .route("/loans/borrow", post(loans::borrow_book))
        .route("/loans/return", post(loans::return_book))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Login behind a global token bucket
fn login_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new().route("/auth/login", post(auth::login));

    let governor = GovernorConfigBuilder::default()
        .key_extractor(GlobalKeyExtractor)
        .per_second(state.config.auth.login_replenish_seconds.max(1))
        .burst_size(state.config.auth.login_burst.max(1))
        .finish();

    match governor {
        // The layer borrows its config for the life of the router
        Some(config) => routes.layer(GovernorLayer {
            config: Box::leak(Box::new(config)),
        }),
        None => {
            tracing::warn!("Invalid login rate limit settings, login is not rate limited");
            routes
        }
    }
}
