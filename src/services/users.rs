//! User management service

use crate::{
    error::{AppError, AppResult},
    models::{
        book::LoanedBook,
        library::Library,
        user::{CreateUser, NewIdentity, UpdateUser},
        Role, User,
    },
    repository::{IdentityStore, Repository},
    services::session::SessionManager,
};

/// How many returned loans the history endpoint shows
const RETURNED_HISTORY_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    session: SessionManager,
}

impl UsersService {
    pub fn new(repository: Repository, session: SessionManager) -> Self {
        Self { repository, session }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.repository.users.get_by_email(email.trim()).await
    }

    /// Create an account with an explicit role (defaults to `user`)
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let created = self
            .repository
            .users
            .create_identity(&NewIdentity {
                email: user.email.trim().to_lowercase(),
                first_name: user.first_name,
                last_name: user.last_name,
                password_hash: self.session.hash_password(&user.password)?,
                role: user.role.unwrap_or(Role::User),
            })
            .await?;

        tracing::info!(user_id = created.id, role = %created.role, "User created");
        Ok(created)
    }

    pub async fn update_user(&self, id: i32, user: UpdateUser) -> AppResult<User> {
        self.repository.users.get_by_id(id).await?;

        if let Some(ref email) = user.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        let password = match user.password {
            Some(ref password) => Some(self.session.hash_password(password)?),
            None => None,
        };

        self.repository.users.update(id, &user, password).await
    }

    /// Delete a user; refused while they still hold books
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        let open = self.repository.users.borrowed_books(id).await?;
        if !open.is_empty() {
            return Err(AppError::Conflict(format!(
                "User {} still holds {} borrowed book(s)",
                id,
                open.len()
            )));
        }
        self.repository.users.delete(id).await
    }

    pub async fn borrowed_books(&self, user_id: i32) -> AppResult<Vec<LoanedBook>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository.users.borrowed_books(user_id).await
    }

    pub async fn returned_books(&self, user_id: i32) -> AppResult<Vec<LoanedBook>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository
            .users
            .returned_books(user_id, RETURNED_HISTORY_LIMIT)
            .await
    }

    pub async fn home_library(&self, user_id: i32) -> AppResult<Option<Library>> {
        let user = self.repository.users.get_by_id(user_id).await?;
        match user.home_library_id {
            Some(id) => Ok(Some(self.repository.libraries.get_by_id(id).await?)),
            None => Ok(None),
        }
    }

    pub async fn set_home_library(&self, user_id: i32, library_id: i32) -> AppResult<User> {
        self.repository.libraries.get_by_id(library_id).await?;
        self.repository.users.set_home_library(user_id, library_id).await
    }
}
