//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, RegisterUser, SessionUser},
        User,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Session opened by register, login or refresh
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    /// Short-lived access token, also set as a cookie
    pub access_token: String,
    /// Identity snapshot the tokens were issued for
    pub user_info: SessionUser,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created, session cookies set", body = SessionResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterUser>,
) -> AppResult<(StatusCode, CookieJar, Json<SessionResponse>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (jar, user_info, tokens) = state.services.auth.register(request).await?.into_jar(jar);

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            access_token: tokens.access_token,
            user_info,
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookies set", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many login attempts")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let (jar, user_info, tokens) = state
        .services
        .auth
        .login(&request.email, &request.password)
        .await?
        .into_jar(jar);

    Ok((
        jar,
        Json(SessionResponse {
            access_token: tokens.access_token,
            user_info,
        }),
    ))
}

/// Reissue the token pair from the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New session cookies set", body = SessionResponse),
        (status = 401, description = "Missing, expired or invalid refresh cookie", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let issued = state.services.auth.refresh(&jar).await?;
    let (jar, user_info, tokens) = issued.into_jar(jar);

    Ok((
        jar,
        Json(SessionResponse {
            access_token: tokens.access_token,
            user_info,
        }),
    ))
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.auth.current_identity(claims.user_id()).await?;
    Ok(Json(user))
}

/// Clear the session cookies
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session cookies cleared")
    )
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (StatusCode, CookieJar) {
    let [access, refresh] = state.services.session.expired_cookies();
    (StatusCode::NO_CONTENT, jar.add(access).add(refresh))
}
