//! Catalog service: books and their availability

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookAvailability, BookQuery, CreateBook, UpdateBook},
        ledger::LedgerEntry,
    },
    repository::Repository,
    services::ledger::InventoryLedger,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    ledger: InventoryLedger,
}

impl CatalogService {
    pub fn new(repository: Repository, ledger: InventoryLedger) -> Self {
        Self { repository, ledger }
    }

    /// Search books, returning the page and the total match count
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64, i64, i64)> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);
        let (books, total) = self
            .repository
            .books
            .search(query.q.trim(), query.by, limit, offset)
            .await?;
        Ok((books, total, limit, offset))
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn get_book_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        self.repository.books.get_by_isbn(isbn.trim()).await
    }

    /// Catalogue a book and stock its first copy. The target library is
    /// settled before anything is written.
    pub async fn create_book(&self, data: CreateBook) -> AppResult<(Book, LedgerEntry)> {
        if let Some(library_id) = data.library_id {
            self.repository.libraries.get_by_id(library_id).await?;
        }
        let library_id = self.ledger.target_library(data.library_id).await?;

        let (book, stock) = self.repository.books.create_with_copy(&data, library_id).await?;

        tracing::info!(book_id = book.id, library_id = stock.library_id, "Book catalogued");
        Ok((book, stock))
    }

    /// Stock one more copy of an existing book at a library
    pub async fn add_copy(&self, book_id: i32, library_id: i32) -> AppResult<LedgerEntry> {
        self.repository.books.get_by_id(book_id).await?;
        self.repository.libraries.get_by_id(library_id).await?;
        self.ledger.stock_new_copy(book_id, library_id).await
    }

    pub async fn update_book(&self, id: i32, data: UpdateBook) -> AppResult<Book> {
        self.repository.books.update(id, &data).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await
    }

    /// Book details with its counts at one library
    pub async fn availability(&self, book_id: i32, library_id: i32) -> AppResult<BookAvailability> {
        let book = self.repository.books.get_by_id(book_id).await?;
        let stock = self.ledger.entry(book_id, library_id).await?;
        Ok(BookAvailability { book, stock })
    }
}
