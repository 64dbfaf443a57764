mod common;

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{EncodingKey, Header, encode};
use natours::models::Role;
use natours::services::jwt::Claims;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use common::{signup, signup_with_role, spawn_app, tour_payload, unreachable_pool};

#[tokio::test]
async fn missing_token_is_rejected_before_the_handler() {
    // Any database access would fail, so a 401 proves the handler never ran
    let (address, _) = spawn_app(unreachable_pool()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/api/v1/users/me"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
    assert_eq!(
        body["message"],
        "You are not logged in! Please log in to get access."
    );
}

#[tokio::test]
async fn expired_token_is_rejected_with_expiry_message() {
    let (address, _) = spawn_app(unreachable_pool()).await;
    let client = reqwest::Client::new();

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-test-secret-with-enough-entropy"),
    )
    .unwrap();

    let response = client
        .get(format!("{address}/api/v1/users/me"))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Your token has expired! Please log in again.");
}

#[tokio::test]
async fn tampered_token_is_invalid() {
    let (address, _) = spawn_app(unreachable_pool()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/api/v1/users/me"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token! Please log in again.");
}

#[sqlx::test]
async fn non_admin_gets_403_on_admin_route(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (token, _) = signup(&client, &address, "Regular User", "regular@example.io").await;

    let response = client
        .get(format!("{address}/api/v1/users"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "You do not have permission to perform this action"
    );
}

#[sqlx::test]
async fn admin_can_list_accounts(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    signup(&client, &address, "Regular User", "regular@example.io").await;
    let (token, _) =
        signup_with_role(&client, &address, &pool, "admin@example.io", Role::Admin).await;

    let response = client
        .get(format!("{address}/api/v1/users"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 2);
    assert!(body["requestedAt"].is_string());
    assert!(body["data"]["data"][0].get("passwordHash").is_none());
}

#[sqlx::test]
async fn cookie_session_authenticates_and_logout_clears_it(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    signup(&client, &address, "Cookie Monster", "cookie@example.io").await;

    let response = client
        .get(format!("{address}/api/v1/users/me"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["data"]["email"], "cookie@example.io");

    let response = client
        .get(format!("{address}/api/v1/users/logout"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let response = client
        .get(format!("{address}/api/v1/users/me"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
async fn signout_path_also_ends_the_session(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    signup(&client, &address, "Cookie Monster", "cookie@example.io").await;

    let response = client
        .get(format!("{address}/api/v1/users/signout"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let set_cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("jwt=loggedout"));
    assert!(set_cookie.contains("HttpOnly"));

    let response = client
        .get(format!("{address}/api/v1/users/me"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
async fn guide_cannot_create_tours(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let (token, _) =
        signup_with_role(&client, &address, &pool, "guide@example.io", Role::Guide).await;

    let response = client
        .post(format!("{address}/api/v1/tours"))
        .bearer_auth(&token)
        .json(&tour_payload("The Forest Hiker", 397.0))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);

    // Guides may read the monthly plan
    let response = client
        .get(format!("{address}/api/v1/tours/monthly-plan/2031"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}
