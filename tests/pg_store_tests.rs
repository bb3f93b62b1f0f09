//! PostgreSQL store tests. Each test migrates a private schema in the
//! database named by DATABASE_URL and drops it afterwards.
//!
//! Run with: cargo test --test pg_store_tests -- --ignored

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use libris_server::{
    config::{AppConfig, AuthConfig, DatabaseConfig, LedgerConfig, LoggingConfig, ServerConfig},
    models::{book::CreateBook, library::CreateLibrary, user::NewIdentity, Role},
    repository::{IdentityStore, LedgerStore, LedgerTx, Repository},
    services::{ledger::InventoryLedger, Services},
    AppError,
};

struct TestDb {
    pool: PgPool,
    repository: Repository,
    url: String,
    schema: String,
}

impl TestDb {
    async fn new() -> Self {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url);
        let schema = format!("libris_test_{}", Uuid::new_v4().simple());

        let admin = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .expect("Failed to connect to database");
        admin
            .execute(format!("CREATE SCHEMA {}", schema).as_str())
            .await
            .expect("Failed to create schema");
        admin.close().await;

        let search_path = format!("SET search_path TO {}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("Failed to connect to database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Self {
            repository: Repository::new(pool.clone()),
            pool,
            url,
            schema,
        }
    }

    fn ledger(&self) -> InventoryLedger {
        InventoryLedger::new(Arc::new(self.repository.ledger.clone()), LedgerConfig::default())
    }

    fn services(&self) -> Services {
        let config = AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            ledger: LedgerConfig::default(),
            logging: LoggingConfig::default(),
        };
        Services::new(self.repository.clone(), &config)
    }

    async fn library(&self, name: &str) -> i32 {
        self.repository
            .libraries
            .create(&CreateLibrary {
                name: name.to_string(),
                city: "Testville".to_string(),
                street_address: String::new(),
                postal_code: String::new(),
                country: String::new(),
                phone: String::new(),
            })
            .await
            .expect("Failed to create library")
            .id
    }

    /// Book with `copies` available copies at `library_id`
    async fn book(&self, isbn: &str, library_id: i32, copies: i32) -> i32 {
        let (book, _) = self
            .repository
            .books
            .create_with_copy(&new_book(isbn, Some(library_id)), library_id)
            .await
            .expect("Failed to create book");
        for _ in 1..copies {
            self.ledger().stock_new_copy(book.id, library_id).await.unwrap();
        }
        book.id
    }

    async fn reader(&self, n: usize) -> i32 {
        self.repository
            .users
            .create_identity(&NewIdentity {
                email: format!("reader{}@libris.test", n),
                first_name: "Test".to_string(),
                last_name: format!("Reader {}", n),
                password_hash: "not-a-real-hash".to_string(),
                role: Role::User,
            })
            .await
            .expect("Failed to create user")
            .id
    }

    async fn counts(&self, book_id: i32, library_id: i32) -> (i32, i32, i32) {
        let e = self.ledger().entry(book_id, library_id).await.unwrap();
        (e.total_copies, e.available_copies, e.borrowed_copies)
    }

    async fn open_loans(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE returned_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn drop_schema(self) {
        self.pool.close().await;
        let admin = PgPoolOptions::new().max_connections(1).connect(&self.url).await.unwrap();
        admin
            .execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
            .await
            .unwrap();
    }
}

fn new_book(isbn: &str, library_id: Option<i32>) -> CreateBook {
    CreateBook {
        title: format!("Book {}", isbn),
        author: "Test Author".to_string(),
        isbn: isbn.to_string(),
        published_at: None,
        summary: String::new(),
        thumbnail: String::new(),
        edition: String::new(),
        library_id,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_borrows_never_overallocate() {
    const AVAILABLE: i32 = 3;
    const CALLERS: usize = 12;

    let db = TestDb::new().await;
    let library = db.library("Main").await;
    let book = db.book("9780000000001", library, AVAILABLE).await;
    let mut readers = Vec::new();
    for n in 0..CALLERS {
        readers.push(db.reader(n).await);
    }

    let ledger = db.ledger();
    let handles: Vec<_> = readers
        .into_iter()
        .map(|user_id| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.borrow(user_id, book, library).await })
        })
        .collect();

    let mut successes = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::NoCopiesAvailable { .. }) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, AVAILABLE);
    assert_eq!(exhausted, CALLERS as i32 - AVAILABLE);
    assert_eq!(db.counts(book, library).await, (AVAILABLE, 0, AVAILABLE));
    assert_eq!(db.open_loans().await, i64::from(AVAILABLE));

    db.drop_schema().await;
}

#[tokio::test]
#[ignore]
async fn test_same_book_at_another_library_is_already_borrowed() {
    let db = TestDb::new().await;
    let main = db.library("Main").await;
    let branch = db.library("Branch").await;
    let book = db.book("9780000000002", main, 2).await;
    db.ledger().stock_new_copy(book, branch).await.unwrap();
    let reader = db.reader(1).await;

    assert_ok!(db.ledger().borrow(reader, book, main).await);
    let err = assert_err!(db.ledger().borrow(reader, book, branch).await);

    assert!(matches!(err, AppError::AlreadyBorrowed { .. }));
    assert_eq!(db.counts(book, branch).await, (1, 1, 0));
    assert_eq!(db.open_loans().await, 1);

    db.drop_schema().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_racing_borrows_at_two_libraries_leave_one_loan() {
    let db = TestDb::new().await;
    let main = db.library("Main").await;
    let branch = db.library("Branch").await;
    let book = db.book("9780000000003", main, 1).await;
    db.ledger().stock_new_copy(book, branch).await.unwrap();
    let reader = db.reader(1).await;

    // Different ledger rows, so only the open-loan index can settle the race
    let ledger = db.ledger();
    let handles: Vec<_> = [main, branch]
        .into_iter()
        .map(|library| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.borrow(reader, book, library).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::AlreadyBorrowed { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(db.open_loans().await, 1);
    let borrowed = db.counts(book, main).await.2 + db.counts(book, branch).await.2;
    assert_eq!(borrowed, 1);

    db.drop_schema().await;
}

#[tokio::test]
#[ignore]
async fn test_borrow_then_return_round_trip() {
    let db = TestDb::new().await;
    let library = db.library("Main").await;
    let book = db.book("9780000000004", library, 2).await;
    let reader = db.reader(1).await;

    db.ledger().borrow(reader, book, library).await.unwrap();
    assert_eq!(db.counts(book, library).await, (2, 1, 1));

    let after = db.ledger().return_book(reader, book, library).await.unwrap();
    assert_eq!((after.total_copies, after.available_copies, after.borrowed_copies), (2, 2, 0));
    assert_eq!(db.open_loans().await, 0);

    let err = assert_err!(db.ledger().return_book(reader, book, library).await);
    assert!(matches!(err, AppError::NoOpenLoan { .. }));

    db.drop_schema().await;
}

#[tokio::test]
#[ignore]
async fn test_conditional_update_never_goes_negative() {
    let db = TestDb::new().await;
    let library = db.library("Main").await;
    let book = db.book("9780000000005", library, 1).await;

    let mut tx = db.repository.ledger.begin().await.unwrap();
    let refused = tx.adjust_ledger_entry(book, library, -2, 2).await.unwrap();
    assert!(refused.is_none());
    let missing = tx.adjust_ledger_entry(book, library + 1000, -1, 1).await.unwrap();
    assert!(missing.is_none());
    tx.commit().await.unwrap();

    assert_eq!(db.counts(book, library).await, (1, 1, 0));

    db.drop_schema().await;
}

#[tokio::test]
#[ignore]
async fn test_closing_a_closed_loan_is_inconsistent() {
    let db = TestDb::new().await;
    let library = db.library("Main").await;
    let book = db.book("9780000000006", library, 1).await;
    let reader = db.reader(1).await;
    db.ledger().borrow(reader, book, library).await.unwrap();

    let mut tx = db.repository.ledger.begin().await.unwrap();
    let loan = tx.find_open_loan(reader, book).await.unwrap().expect("open loan");
    assert_ok!(tx.close_loan(loan.id, Utc::now()).await);
    let err = assert_err!(tx.close_loan(loan.id, Utc::now()).await);
    assert!(matches!(err, AppError::InconsistentState(_)));
    drop(tx);

    // Dropped without commit: the loan is still open
    assert_eq!(db.open_loans().await, 1);

    db.drop_schema().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_library_delete_waits_for_borrow_in_flight() {
    let db = TestDb::new().await;
    let library = db.library("Main").await;
    let book = db.book("9780000000007", library, 1).await;
    let reader = db.reader(1).await;

    // A borrow that has locked and updated its row but not yet committed
    let mut borrow = db.repository.ledger.begin().await.unwrap();
    borrow.lock_ledger_entry(book, library).await.unwrap().expect("entry");
    borrow.adjust_ledger_entry(book, library, -1, 1).await.unwrap().expect("adjusted");
    let now = Utc::now();
    borrow
        .insert_loan(reader, book, now + chrono::Duration::days(14), now)
        .await
        .unwrap();

    let libraries = db.services().libraries;
    let delete = tokio::spawn(async move { libraries.delete(library).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!delete.is_finished());

    borrow.commit().await.unwrap();
    let err = assert_err!(delete.await.unwrap());
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(db.counts(book, library).await, (1, 0, 1));
    assert_ok!(db.ledger().return_book(reader, book, library).await);

    db.drop_schema().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_book_delete_waits_for_borrow_in_flight() {
    let db = TestDb::new().await;
    let library = db.library("Main").await;
    let book = db.book("9780000000008", library, 1).await;
    let reader = db.reader(1).await;

    let mut borrow = db.repository.ledger.begin().await.unwrap();
    borrow.lock_ledger_entry(book, library).await.unwrap().expect("entry");
    borrow.adjust_ledger_entry(book, library, -1, 1).await.unwrap().expect("adjusted");
    let now = Utc::now();
    borrow
        .insert_loan(reader, book, now + chrono::Duration::days(14), now)
        .await
        .unwrap();

    let catalog = db.services().catalog;
    let delete = tokio::spawn(async move { catalog.delete_book(book).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!delete.is_finished());

    borrow.commit().await.unwrap();
    let err = assert_err!(delete.await.unwrap());
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(db.open_loans().await, 1);

    db.drop_schema().await;
}

#[tokio::test]
#[ignore]
async fn test_create_book_without_any_library_writes_nothing() {
    let db = TestDb::new().await;
    let catalog = db.services().catalog;

    let err = assert_err!(catalog.create_book(new_book("9780000000009", None)).await);
    assert!(matches!(err, AppError::Validation(_)));
    let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(books, 0);

    // The same request succeeds once a library exists
    let library = db.library("Main").await;
    let (book, stock) = assert_ok!(catalog.create_book(new_book("9780000000009", None)).await);
    assert_eq!(stock.book_id, book.id);
    assert_eq!(stock.library_id, library);
    assert_eq!(
        (stock.total_copies, stock.available_copies, stock.borrowed_copies),
        (1, 1, 0)
    );

    db.drop_schema().await;
}
