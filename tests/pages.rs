mod common;

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{EncodingKey, Header, encode};
use natours::models::Role;
use natours::services::jwt::Claims;
use serde_json::json;
use sqlx::PgPool;

use common::{create_tour, signup, signup_with_role, spawn_app, tour_payload};

#[sqlx::test]
async fn overview_and_tour_page_render(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let (staff, _) =
        signup_with_role(&client, &address, &pool, "lead@example.io", Role::LeadGuide).await;
    let mut payload = tour_payload("The <Forest> Hiker", 397.0);
    payload["description"] = json!("First paragraph.\nSecond paragraph.");
    create_tour(&client, &address, &staff, payload).await;

    let response = client.get(format!("{address}/")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("The &lt;Forest&gt; Hiker"));
    assert!(!body.contains("<Forest>"));
    assert!(body.contains("/tour/the-forest-hiker"));

    let response = client
        .get(format!("{address}/tour/the-forest-hiker"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Second paragraph."));
    assert!(body.contains("Log in to book tour"));
}

#[sqlx::test]
async fn account_page_requires_login(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{address}/me")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
}

#[sqlx::test]
async fn account_settings_form_updates_profile(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    signup(&client, &address, "Miyah Myles", "miyah@example.io").await;

    let response = client.get(format!("{address}/me")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.text().await.unwrap().contains("miyah@example.io"));

    let response = client
        .post(format!("{address}/submit-user-data"))
        .form(&[("name", "Miyah Myles-Hart"), ("email", "miyah.hart@example.io")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Miyah Myles-Hart"));
    assert!(body.contains("miyah.hart@example.io"));
}

#[sqlx::test]
async fn login_page_shows_viewer(pool: PgPool) {
    let (address, _) = spawn_app(pool).await;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();

    let response = client.get(format!("{address}/login")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Log into your account"));

    signup(&client, &address, "Miyah Myles", "miyah@example.io").await;
    let response = client.get(format!("{address}/")).send().await.unwrap();
    assert!(response.text().await.unwrap().contains("Miyah"));
}

fn expired_token_for(user_id: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-test-secret-with-enough-entropy"),
    )
    .unwrap()
}

/// Fetches `path` with `jwt=<token>` and asserts an anonymous 200 page.
async fn assert_anonymous_page(client: &reqwest::Client, address: &str, path: &str, token: &str) {
    let response = client
        .get(format!("{address}{path}"))
        .header("cookie", format!("jwt={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK, "{path}");
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"href="/login">Log in</a>"#), "{path}");
    assert!(!body.contains("Log out"), "{path}");
}

#[sqlx::test]
async fn broken_sessions_render_pages_anonymously(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let (staff, _) =
        signup_with_role(&client, &address, &pool, "lead@example.io", Role::LeadGuide).await;
    create_tour(&client, &address, &staff, tour_payload("The Forest Hiker", 397.0)).await;
    let (token, id) = signup(&client, &address, "Leaving Soon", "leaving@example.io").await;

    let mut tampered = token.clone();
    tampered.push('x');
    let expired = expired_token_for(&id);

    for path in ["/", "/tour/the-forest-hiker", "/login"] {
        assert_anonymous_page(&client, &address, path, &tampered).await;
        assert_anonymous_page(&client, &address, path, &expired).await;
        assert_anonymous_page(&client, &address, path, "not-a-jwt").await;
    }

    let response = client
        .delete(format!("{address}/api/v1/users/deleteMe"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    for path in ["/", "/tour/the-forest-hiker"] {
        assert_anonymous_page(&client, &address, path, &token).await;
    }
}
