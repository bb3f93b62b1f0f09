//! Books repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, SearchField, UpdateBook},
        ledger::LedgerEntry,
    },
};

const UNIQUE_ISBN: &str = "books_isbn_key";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by ISBN
    pub async fn get_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ISBN {} not found", isbn)))
    }

    /// Case-insensitive substring search on one field, with the total match count
    pub async fn search(
        &self,
        text: &str,
        field: SearchField,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let column = match field {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::Isbn => "isbn",
        };
        let pattern = format!("%{}%", text);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM books WHERE {} ILIKE $1",
            column
        ))
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT * FROM books WHERE {} ILIKE $1 ORDER BY title, id LIMIT $2 OFFSET $3",
            column
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Create a book and its first copy at `library_id` in one transaction
    pub async fn create_with_copy(&self, data: &CreateBook, library_id: i32) -> AppResult<(Book, LedgerEntry)> {
        let published_at = data.published_at.unwrap_or_else(Utc::now);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, published_at, summary, thumbnail, edition)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.isbn)
        .bind(published_at)
        .bind(&data.summary)
        .bind(&data.thumbnail)
        .bind(&data.edition)
        .fetch_one(&mut *tx)
        .await;

        let book = match result {
            Ok(book) => book,
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(UNIQUE_ISBN) => {
                return Err(AppError::Conflict(format!("A book with ISBN {} already exists", data.isbn)))
            }
            Err(e) => return Err(e.into()),
        };

        let stock = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO library_stock (book_id, library_id, total_copies, available_copies, borrowed_copies)
            VALUES ($1, $2, 1, 1, 0)
            RETURNING book_id, library_id, total_copies, available_copies, borrowed_copies
            "#,
        )
        .bind(book.id)
        .bind(library_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((book, stock))
    }

    /// Update book
    pub async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
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

        add_field!(data.title, "title");
        add_field!(data.author, "author");
        add_field!(data.isbn, "isbn");
        add_field!(data.published_at, "published_at");
        add_field!(data.summary, "summary");
        add_field!(data.thumbnail, "thumbnail");
        add_field!(data.edition, "edition");

        let query = format!("UPDATE books SET {} WHERE id = ${} RETURNING *", sets.join(", "), idx);

        let mut builder = sqlx::query_as::<_, Book>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.title);
        bind_field!(data.author);
        bind_field!(data.isbn);
        bind_field!(data.published_at);
        bind_field!(data.summary);
        bind_field!(data.thumbnail);
        bind_field!(data.edition);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book; refused while any copy is out on loan.
    ///
    /// Locks every stock row of the book first: a borrow holds the same lock
    /// from its first statement until its loan is committed.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT library_id FROM library_stock WHERE book_id = $1 FOR UPDATE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let on_loan: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE book_id = $1 AND returned_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if on_loan {
            return Err(AppError::Conflict(format!("Book {} has copies on loan", id)));
        }

        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
