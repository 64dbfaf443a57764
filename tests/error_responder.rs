mod common;

use natours::config::Environment;
use serde_json::{Value, json};
use sqlx::PgPool;

use common::{spawn_app, spawn_app_with, test_config, unreachable_pool};

#[tokio::test]
async fn production_hides_unclassified_errors() {
    let (address, _) =
        spawn_app_with(test_config(Environment::Production), unreachable_pool()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/api/v1/tours"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "error", "message": "Something went very wrong!" })
    );
}

#[tokio::test]
async fn development_exposes_error_details() {
    let (address, _) = spawn_app(unreachable_pool()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/api/v1/tours"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["operational"], false);
    assert!(body["stack"].is_string());
}

#[tokio::test]
async fn production_keeps_operational_messages() {
    let (address, _) =
        spawn_app_with(test_config(Environment::Production), unreachable_pool()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/api/v1/tours/not-a-uuid"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "fail", "message": "Invalid id: not-a-uuid" })
    );
}

#[sqlx::test]
async fn unknown_api_route_is_404(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/api/v1/nothing-here"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
    assert_eq!(
        body["message"],
        "Can't find /api/v1/nothing-here on this server!"
    );
}

#[sqlx::test]
async fn unknown_page_renders_html_error(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/tour/no-such-tour"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("There is no tour with that name."));
}

#[sqlx::test]
async fn malformed_json_body_is_400(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{address}/api/v1/users/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}
