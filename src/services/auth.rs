//! Registration, login and token refresh

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{NewIdentity, RegisterUser, SessionUser},
        Role, User,
    },
    repository::IdentityStore,
    services::session::{IssuedSession, SessionManager},
};

const BAD_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    session: SessionManager,
}

impl AuthService {
    pub fn new(identities: Arc<dyn IdentityStore>, session: SessionManager) -> Self {
        Self { identities, session }
    }

    /// Create a `user`-role account and open a session for it
    pub async fn register(&self, data: RegisterUser) -> AppResult<IssuedSession> {
        if data.password != data.confirm_password {
            return Err(AppError::Validation("Passwords do not match".to_string()));
        }

        let email = data.email.trim().to_lowercase();
        if self.identities.find_identity_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = self
            .identities
            .create_identity(&NewIdentity {
                email,
                first_name: data.first_name,
                last_name: data.last_name,
                password_hash: self.session.hash_password(&data.password)?,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        self.session.issue(&SessionUser::from(&user))
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<IssuedSession> {
        let user = self
            .identities
            .find_identity_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(|| AppError::Authentication(BAD_CREDENTIALS.to_string()))?;

        if !self.session.verify_password(&user.password, password)? {
            tracing::debug!(user_id = user.id, "Password mismatch");
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        }

        tracing::info!(user_id = user.id, "User logged in");
        self.session.issue(&SessionUser::from(&user))
    }

    /// Exchange a valid refresh cookie for a new pair. The identity is
    /// re-read so the new pair reflects the current role.
    pub async fn refresh(&self, jar: &CookieJar) -> AppResult<IssuedSession> {
        let claims = self.session.verify_and_extract(jar)?;
        let user = self.current_identity(claims.user_id()).await?;
        self.session.issue(&SessionUser::from(&user))
    }

    /// Identity behind verified claims
    pub async fn current_identity(&self, user_id: i32) -> AppResult<User> {
        self.identities
            .find_identity_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Account no longer exists".to_string()))
    }
}
