//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, libraries, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library lending REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::refresh,
        auth::me,
        auth::logout,
        // Users
        users::get_user,
        users::get_user_by_email,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::borrowed_books,
        users::returned_books,
        users::home_library,
        users::set_home_library,
        // Books
        books::search_books,
        books::get_book,
        books::get_book_by_isbn,
        books::get_book_availability,
        books::add_copy,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Libraries
        libraries::list_libraries,
        libraries::get_library_by_name,
        libraries::get_library,
        libraries::create_library,
        libraries::update_library,
        libraries::delete_library,
        // Loans
        loans::borrow_book,
        loans::return_book,
    ),
    components(
        schemas(
            // Auth
            auth::SessionResponse,
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            crate::models::user::SessionUser,
            crate::models::user::Role,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            users::HomeLibraryRequest,
            // Books
            crate::models::book::Book,
            crate::models::book::BookAvailability,
            crate::models::book::LoanedBook,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::SearchField,
            books::CreatedBook,
            // Libraries
            crate::models::library::Library,
            crate::models::library::CreateLibrary,
            crate::models::library::UpdateLibrary,
            // Ledger
            crate::models::ledger::LedgerEntry,
            crate::models::loan::LoanRequest,
            crate::models::loan::LedgerResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and session cookies"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog"),
        (name = "libraries", description = "Library management"),
        (name = "loans", description = "Borrow and return")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
