//! Live API tests. They need a running server with a migrated database
//! and an admin account (ADMIN_EMAIL / ADMIN_PASSWORD).
//!
//! Run with: cargo test -- --ignored

use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn client() -> Client {
    Client::new()
}

/// `name=value` part of the Set-Cookie header for `name`
fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

struct Reader {
    access_token: String,
    refresh_cookie: String,
    id: i64,
}

/// Register a fresh reader
async fn register_reader(client: &Client) -> Reader {
    let email = format!("reader-{}@libris.test", Uuid::new_v4());
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "email": email,
            "first_name": "Test",
            "last_name": "Reader",
            "password": "reader-password",
            "confirm_password": "reader-password"
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let refresh_cookie = cookie_pair(&response, "refresh_token").expect("No refresh cookie");

    let body: Value = response.json().await.expect("Failed to parse register response");
    Reader {
        access_token: body["access_token"].as_str().expect("No token in response").to_string(),
        refresh_cookie,
        id: body["user_info"]["id"].as_i64().expect("No id in response"),
    }
}

/// Admin access token and id
async fn admin_session(client: &Client) -> (String, i64) {
    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@libris.test".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin-password".to_string());
    login(client, &email, &password).await
}

async fn admin_token(client: &Client) -> String {
    admin_session(client).await.0
}

async fn login(client: &Client, email: &str, password: &str) -> (String, i64) {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse login response");
    (
        body["access_token"].as_str().expect("No token in response").to_string(),
        body["user_info"]["id"].as_i64().expect("No id in response"),
    )
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let response = client()
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_check() {
    let response = client()
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let response = client()
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "nobody@libris.test",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_cookie_session_round_trip() {
    let client = client();
    let reader = register_reader(&client).await;

    // No bearer header: the refresh cookie authenticates
    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header(header::COOKIE, &reader.refresh_cookie)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["id"].as_i64(), Some(reader.id));
    assert_eq!(body["role"], "user");

    let response = client
        .post(format!("{}/auth/refresh", BASE_URL))
        .header(header::COOKIE, &reader.refresh_cookie)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    assert!(cookie_pair(&response, "access_token").is_some());
    assert!(cookie_pair(&response, "refresh_token").is_some());

    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(cookie_pair(&response, "refresh_token").as_deref(), Some("refresh_token="));
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_create_books() {
    let client = client();
    let reader = register_reader(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&reader.access_token)
        .json(&json!({ "title": "Forbidden", "isbn": "9780000000001" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_flow() {
    let admin_client = client();
    let admin = admin_token(&admin_client).await;

    let suffix = Uuid::new_v4().simple().to_string();
    let response = admin_client
        .post(format!("{}/libraries", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "name": format!("Branch {}", suffix), "city": "Testville" }))
        .send()
        .await
        .expect("Failed to create library");
    assert_eq!(response.status(), StatusCode::CREATED);
    let library: Value = response.json().await.expect("Failed to parse library");
    let library_id = library["id"].as_i64().expect("library id");

    // Let the stocking job snapshot the catalog before the new book exists
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let response = admin_client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "title": format!("Ledger Test {}", suffix),
            "author": "Test Author",
            "isbn": format!("978{}", &suffix[..10]),
            "library_id": library_id
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("Failed to parse book");
    let book_id = created["book"]["id"].as_i64().expect("book id");
    assert_eq!(created["stock"]["available_copies"], 1);

    let reader_a = client();
    let token_a = register_reader(&reader_a).await.access_token;
    let reader_b = client();
    let token_b = register_reader(&reader_b).await.access_token;
    let request = json!({ "book_id": book_id, "library_id": library_id });

    let response = reader_a
        .post(format!("{}/loans/borrow", BASE_URL))
        .bearer_auth(&token_a)
        .json(&request)
        .send()
        .await
        .expect("Failed to borrow");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse borrow");
    assert_eq!(body["stock"]["available_copies"], 0);
    assert_eq!(body["stock"]["borrowed_copies"], 1);

    let response = reader_b
        .post(format!("{}/loans/borrow", BASE_URL))
        .bearer_auth(&token_b)
        .json(&request)
        .send()
        .await
        .expect("Failed to borrow");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "NoCopiesAvailable");

    let response = reader_a
        .post(format!("{}/loans/return", BASE_URL))
        .bearer_auth(&token_a)
        .json(&request)
        .send()
        .await
        .expect("Failed to return");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse return");
    assert_eq!(body["stock"]["available_copies"], 1);
    assert_eq!(body["stock"]["borrowed_copies"], 0);
}

#[tokio::test]
#[ignore]
async fn test_staff_cannot_update_admin_account() {
    let client = client();
    let (admin, admin_id) = admin_session(&client).await;

    let email = format!("clerk-{}@libris.test", Uuid::new_v4());
    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "email": email,
            "first_name": "Test",
            "last_name": "Clerk",
            "password": "clerk-password",
            "role": "staff"
        }))
        .send()
        .await
        .expect("Failed to create staff user");
    assert_eq!(response.status(), StatusCode::CREATED);
    let (staff, _) = login(&client, &email, "clerk-password").await;

    let response = client
        .put(format!("{}/users/{}", BASE_URL, admin_id))
        .bearer_auth(&staff)
        .json(&json!({ "password": "staff-chosen-password" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Staff still manage reader accounts
    let reader = register_reader(&client).await;
    let response = client
        .put(format!("{}/users/{}", BASE_URL, reader.id))
        .bearer_auth(&staff)
        .json(&json!({ "first_name": "Renamed" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}
