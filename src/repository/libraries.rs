//! Libraries repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::library::{CreateLibrary, Library, UpdateLibrary},
};

const UNIQUE_NAME: &str = "libraries_name_key";

#[derive(Clone)]
pub struct LibrariesRepository {
    pool: Pool<Postgres>,
}

impl LibrariesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List libraries with pagination, plus the total count
    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<(Vec<Library>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM libraries")
            .fetch_one(&self.pool)
            .await?;

        let libraries = sqlx::query_as::<_, Library>(
            "SELECT * FROM libraries ORDER BY name, id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((libraries, total))
    }

    /// Get library by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Library> {
        sqlx::query_as::<_, Library>("SELECT * FROM libraries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Library with id {} not found", id)))
    }

    /// Get library by name (case-insensitive)
    pub async fn get_by_name(&self, name: &str) -> AppResult<Library> {
        sqlx::query_as::<_, Library>("SELECT * FROM libraries WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Library named {} not found", name)))
    }

    /// Create library
    pub async fn create(&self, data: &CreateLibrary) -> AppResult<Library> {
        let result = sqlx::query_as::<_, Library>(
            r#"
            INSERT INTO libraries (name, city, street_address, postal_code, country, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.city)
        .bind(&data.street_address)
        .bind(&data.postal_code)
        .bind(&data.country)
        .bind(&data.phone)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(library) => Ok(library),
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(UNIQUE_NAME) => Err(
                AppError::Conflict(format!("A library named {} already exists", data.name)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Update library
    pub async fn update(&self, id: i32, data: &UpdateLibrary) -> AppResult<Library> {
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

        add_field!(data.name, "name");
        add_field!(data.city, "city");
        add_field!(data.street_address, "street_address");
        add_field!(data.postal_code, "postal_code");
        add_field!(data.country, "country");
        add_field!(data.phone, "phone");

        let query = format!("UPDATE libraries SET {} WHERE id = ${} RETURNING *", sets.join(", "), idx);

        let mut builder = sqlx::query_as::<_, Library>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.city);
        bind_field!(data.street_address);
        bind_field!(data.postal_code);
        bind_field!(data.country);
        bind_field!(data.phone);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Library with id {} not found", id)))
    }

    /// Delete library; refused while any of its copies is on loan.
    ///
    /// The library's stock rows are locked before the check, so a borrow in
    /// flight either commits first (and the delete is refused) or finds its
    /// row gone once the delete commits.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let borrowed: Vec<i32> = sqlx::query_scalar(
            "SELECT borrowed_copies FROM library_stock WHERE library_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        if borrowed.iter().any(|&n| n > 0) {
            return Err(AppError::Conflict(format!("Library {} has copies on loan", id)));
        }

        let result = sqlx::query("DELETE FROM libraries WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Library with id {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
