//! API integration tests
//!
//! Run against a live server with an administrator account:
//! `SCHOOLIB_TEST_LOGIN=admin SCHOOLIB_TEST_PASSWORD=admin cargo test -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn admin_credentials() -> (String, String) {
    (
        std::env::var("SCHOOLIB_TEST_LOGIN").unwrap_or_else(|_| "admin".to_string()),
        std::env::var("SCHOOLIB_TEST_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
    )
}

async fn login(client: &Client, login: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "login": login, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["access_token"]
        .as_str()
        .expect("No access token in response")
        .to_string()
}

async fn admin_token(client: &Client) -> String {
    let (user, password) = admin_credentials();
    login(client, &user, &password).await
}

/// Create an account with the given rights and log into it
async fn account(client: &Client, admin: &str, rights: &str) -> (i64, String) {
    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(admin)
        .json(&json!([{ "name": "Test", "surname": "Account", "year_of_study": 5, "rights": rights }]))
        .send()
        .await
        .expect("Failed to create user");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse credentials");
    let created = &body[0];
    let token = login(
        client,
        created["login"].as_str().expect("login"),
        created["password"].as_str().expect("password"),
    )
    .await;
    (created["id"].as_i64().expect("id"), token)
}

async fn create_book(client: &Client, token: &str, title: &str, private: bool) -> Value {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": title,
            "authors": "Integration Author",
            "amount": 1,
            "is_private": private
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse book")
}

async fn delete_book(client: &Client, token: &str, id: i64) -> StatusCode {
    client
        .delete(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to delete book")
        .status()
}

fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, uuid::Uuid::new_v4().simple())
}

/// Single alphanumeric token, short enough for a name field
fn unique_word() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("Zz{}", &id[..12])
}

/// Ids returned by a text search on `/books` or `/users`
async fn search_ids(client: &Client, token: &str, resource: &str, text: &str) -> Vec<i64> {
    let response = client
        .get(format!("{}/{}", BASE_URL, resource))
        .bearer_auth(token)
        .query(&[("q", text)])
        .send()
        .await
        .expect("Failed to search");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse page");
    body["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|item| item["id"].as_i64())
        .collect()
}

async fn give_book(client: &Client, token: &str, user_id: i64, book_id: i64) -> i64 {
    let response = client
        .post(format!("{}/checkouts", BASE_URL))
        .bearer_auth(token)
        .json(&json!({ "user_id": user_id, "book_id": book_id, "return_date": "2031-05-20" }))
        .send()
        .await
        .expect("Failed to give book");
    assert_eq!(response.status(), StatusCode::CREATED);

    let checkout: Value = response.json().await.expect("Failed to parse checkout");
    checkout["id"].as_i64().expect("id")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
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
async fn test_requests_without_token_are_rejected() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
#[ignore]
async fn test_public_book_is_found_by_student() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = account(&client, &admin, "student").await;

    let title = unique("Lighthouse Keeper");
    let book = create_book(&client, &admin, &title, false).await;

    let response = client
        .get(format!("{}/books", BASE_URL))
        .bearer_auth(&student)
        .query(&[("q", title.as_str())])
        .send()
        .await
        .expect("Failed to search");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse page");
    let items = body["items"].as_array().expect("items");
    assert_eq!(items[0]["id"], book["id"]);

    delete_book(&client, &admin, book["id"].as_i64().expect("id")).await;
}

#[tokio::test]
#[ignore]
async fn test_private_book_hidden_from_student() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = account(&client, &admin, "student").await;
    let (_, librarian) = account(&client, &admin, "librarian").await;

    let book = create_book(&client, &librarian, &unique("Staff Handbook"), true).await;
    let id = book["id"].as_i64().expect("id");

    let as_student = client
        .get(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(&student)
        .send()
        .await
        .expect("Failed to fetch book");
    assert_eq!(as_student.status(), StatusCode::NOT_FOUND);

    let as_librarian = client
        .get(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to fetch book");
    assert_eq!(as_librarian.status(), StatusCode::OK);

    assert_eq!(delete_book(&client, &librarian, id).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_checkout_lifecycle() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (student_id, student) = account(&client, &admin, "student").await;

    let book = create_book(&client, &admin, &unique("Borrowed Tales"), false).await;
    let book_id = book["id"].as_i64().expect("id");

    let response = client
        .post(format!("{}/checkouts", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "user_id": student_id, "book_id": book_id, "return_date": "2031-05-20" }))
        .send()
        .await
        .expect("Failed to give book");
    assert_eq!(response.status(), StatusCode::CREATED);
    let checkout: Value = response.json().await.expect("Failed to parse checkout");
    let checkout_id = checkout["id"].as_i64().expect("id");

    // The only copy is out
    let second = client
        .post(format!("{}/checkouts", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "user_id": student_id, "book_id": book_id, "return_date": "2031-05-20" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let changed = client
        .put(format!("{}/checkouts/{}", BASE_URL, checkout_id))
        .bearer_auth(&admin)
        .json(&json!({ "return_date": "2031-06-01" }))
        .send()
        .await
        .expect("Failed to change return date");
    assert_eq!(changed.status(), StatusCode::OK);

    let due: Value = client
        .get(format!("{}/checkouts/return-date", BASE_URL))
        .bearer_auth(&student)
        .query(&[("user_id", student_id), ("book_id", book_id)])
        .send()
        .await
        .expect("Failed to read return date")
        .json()
        .await
        .expect("Failed to parse return date");
    assert_eq!(due["return_date"], "2031-06-01");

    assert_eq!(
        delete_book(&client, &admin, book_id).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let returned = client
        .delete(format!("{}/checkouts/{}", BASE_URL, checkout_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to return book");
    assert_eq!(returned.status(), StatusCode::OK);

    assert_eq!(delete_book(&client, &admin, book_id).await, StatusCode::NO_CONTENT);
    assert_eq!(delete_book(&client, &admin, book_id).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_student_cannot_create_book() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = account(&client, &admin, "student").await;
    let title = unique("Forbidden Atlas");

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&student)
        .json(&json!({ "title": title }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body: Value = client
        .get(format!("{}/books", BASE_URL))
        .bearer_auth(&admin)
        .query(&[("title", title.as_str())])
        .send()
        .await
        .expect("Failed to list books")
        .json()
        .await
        .expect("Failed to parse page");
    assert_eq!(body["total"], 0);
}

#[tokio::test]
#[ignore]
async fn test_book_search_follows_create_and_delete() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let title = unique_word();
    let book = create_book(&client, &admin, &title, false).await;
    let id = book["id"].as_i64().expect("id");
    assert!(search_ids(&client, &admin, "books", &title).await.contains(&id));

    assert_eq!(delete_book(&client, &admin, id).await, StatusCode::NO_CONTENT);
    assert!(!search_ids(&client, &admin, "books", &title).await.contains(&id));
}

#[tokio::test]
#[ignore]
async fn test_user_search_follows_create_and_delete() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let surname = unique_word();

    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!([{ "name": "Search", "surname": surname, "year_of_study": 3 }]))
        .send()
        .await
        .expect("Failed to create user");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse credentials");
    let id = body[0]["id"].as_i64().expect("id");

    assert!(search_ids(&client, &admin, "users", &surname).await.contains(&id));

    let deleted = client
        .delete(format!("{}/users/{}", BASE_URL, id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to delete user");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    assert!(!search_ids(&client, &admin, "users", &surname).await.contains(&id));
}

#[tokio::test]
#[ignore]
async fn test_user_holding_a_book_cannot_be_deleted() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (student_id, _) = account(&client, &admin, "student").await;

    let book = create_book(&client, &admin, &unique("Unreturned Chronicle"), false).await;
    let book_id = book["id"].as_i64().expect("id");
    let checkout_id = give_book(&client, &admin, student_id, book_id).await;

    let refused = client
        .delete(format!("{}/users/{}", BASE_URL, student_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(refused.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let still_there = client
        .get(format!("{}/users/{}", BASE_URL, student_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to fetch user");
    assert_eq!(still_there.status(), StatusCode::OK);

    let returned = client
        .delete(format!("{}/checkouts/{}", BASE_URL, checkout_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to return book");
    assert_eq!(returned.status(), StatusCode::OK);

    let deleted = client
        .delete(format!("{}/users/{}", BASE_URL, student_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to delete user");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    delete_book(&client, &admin, book_id).await;
}

#[tokio::test]
#[ignore]
async fn test_forbidden_mutations_leave_search_unchanged() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = account(&client, &admin, "student").await;

    // Refused create: nothing becomes searchable
    let title = unique_word();
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&student)
        .json(&json!({ "title": title }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(search_ids(&client, &admin, "books", &title).await.is_empty());

    // Refused delete and update: the book stays findable by its old title
    let kept_title = unique_word();
    let book = create_book(&client, &admin, &kept_title, false).await;
    let id = book["id"].as_i64().expect("id");

    assert_eq!(delete_book(&client, &student, id).await, StatusCode::FORBIDDEN);
    let renamed = client
        .put(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(&student)
        .json(&json!({ "title": unique_word() }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(renamed.status(), StatusCode::FORBIDDEN);

    assert_eq!(search_ids(&client, &admin, "books", &kept_title).await.first(), Some(&id));

    delete_book(&client, &admin, id).await;
}
