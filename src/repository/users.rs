//! Users repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::IdentityStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::LoanedBook,
        user::{NewIdentity, UpdateUser, User},
    },
};

const UNIQUE_EMAIL: &str = "users_email_key";

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.find_identity_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.find_identity_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with email {} not found", email)))
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::int IS NULL OR id != $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Update a user; `password_hash` replaces the stored hash when present
    pub async fn update(&self, id: i32, data: &UpdateUser, password_hash: Option<String>) -> AppResult<User> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        let email = data.email.as_ref().map(|e| e.to_lowercase());

        add_field!(email, "email");
        add_field!(data.first_name, "first_name");
        add_field!(data.last_name, "last_name");
        add_field!(password_hash, "password");
        add_field!(data.role, "role");

        let query = format!("UPDATE users SET {} WHERE id = ${} RETURNING *", sets.join(", "), idx);

        let mut builder = sqlx::query_as::<_, User>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(email);
        bind_field!(data.first_name);
        bind_field!(data.last_name);
        bind_field!(password_hash);
        bind_field!(data.role);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Delete a user
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// Books the user currently holds
    pub async fn borrowed_books(&self, user_id: i32) -> AppResult<Vec<LoanedBook>> {
        let books = sqlx::query_as::<_, LoanedBook>(
            r#"
            SELECT l.id AS loan_id, b.id AS book_id, b.title, b.author, b.isbn,
                   l.due_date, l.borrowed_at, l.returned_at
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1 AND l.returned_at IS NULL
            ORDER BY l.due_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Most recently returned books, newest first
    pub async fn returned_books(&self, user_id: i32, limit: i64) -> AppResult<Vec<LoanedBook>> {
        let books = sqlx::query_as::<_, LoanedBook>(
            r#"
            SELECT l.id AS loan_id, b.id AS book_id, b.title, b.author, b.isbn,
                   l.due_date, l.borrowed_at, l.returned_at
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1 AND l.returned_at IS NOT NULL
            ORDER BY l.returned_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Set the user's home library
    pub async fn set_home_library(&self, user_id: i32, library_id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET home_library_id = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(library_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }
}

#[async_trait]
impl IdentityStore for UsersRepository {
    async fn find_identity_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_identity_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_identity(&self, identity: &NewIdentity) -> AppResult<User> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, first_name, last_name, password, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(identity.email.to_lowercase())
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.password_hash)
        .bind(identity.role)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(UNIQUE_EMAIL) => {
                Err(AppError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
