mod common;

use natours::models::Role;
use serde_json::{Value, json};
use sqlx::PgPool;

use common::{create_tour, signup_with_role, spawn_app, tour_payload};

async fn staff(client: &reqwest::Client, address: &str, pool: &PgPool) -> String {
    signup_with_role(client, address, pool, "lead@example.io", Role::LeadGuide)
        .await
        .0
}

#[sqlx::test]
async fn create_read_update_delete_tour(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    let id = create_tour(&client, &address, &token, tour_payload("The Forest Hiker", 397.0)).await;

    let response = client
        .get(format!("{address}/api/v1/tours/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let tour = &body["data"]["data"];
    assert_eq!(tour["slug"], "the-forest-hiker");
    assert_eq!(tour["ratingsAverage"], 4.5);
    assert_eq!(tour["ratingsQuantity"], 0);
    assert_eq!(tour["reviews"], json!([]));
    assert!(tour.get("version").is_none());

    let response = client
        .patch(format!("{address}/api/v1/tours/{id}"))
        .bearer_auth(&token)
        .json(&json!({ "name": "The Mountain Biker", "price": 499.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["data"]["slug"], "the-mountain-biker");
    assert_eq!(body["data"]["data"]["price"], 499.0);

    let response = client
        .delete(format!("{address}/api/v1/tours/{id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{address}/api/v1/tours/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn create_tour_validates_discount(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    let mut payload = tour_payload("The Sea Explorer", 497.0);
    payload["priceDiscount"] = json!(600.0);

    let response = client
        .post(format!("{address}/api/v1/tours"))
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid input data.")
    );
}

#[sqlx::test]
async fn list_filters_sorts_projects_and_paginates(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    for (name, price) in [
        ("The Forest Hiker", 397.0),
        ("The Sea Explorer", 497.0),
        ("The Snow Adventurer", 997.0),
        ("The City Wanderer", 1197.0),
    ] {
        create_tour(&client, &address, &token, tour_payload(name, price)).await;
    }

    let response = client
        .get(format!(
            "{address}/api/v1/tours?price[lt]=1000&sort=-price&fields=name,price"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 3);
    let first = &body["data"]["data"][0];
    assert_eq!(first["name"], "The Snow Adventurer");
    let mut keys: Vec<&String> = first.as_object().unwrap().keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["id", "name", "price"]);

    let response = client
        .get(format!("{address}/api/v1/tours?sort=price&page=2&limit=3"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["data"][0]["name"], "The City Wanderer");

    let response = client
        .get(format!("{address}/api/v1/tours?colour=red"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn secret_tours_are_hidden(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    let mut payload = tour_payload("The Secret Getaway", 297.0);
    payload["secretTour"] = json!(true);
    create_tour(&client, &address, &token, payload).await;
    create_tour(&client, &address, &token, tour_payload("The Forest Hiker", 397.0)).await;

    let response = client
        .get(format!("{address}/api/v1/tours"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["data"][0]["name"], "The Forest Hiker");
}

#[sqlx::test]
async fn top_five_cheap_alias(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    for i in 0..6 {
        let name = format!("The Budget Trip No {i}");
        create_tour(&client, &address, &token, tour_payload(&name, 100.0 + f64::from(i))).await;
    }

    let response = client
        .get(format!("{address}/api/v1/tours/top-5-cheap"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 5);
    let first = &body["data"]["data"][0];
    assert_eq!(first["price"], 100.0);
    assert!(first.get("summary").is_some());
    assert!(first.get("imageCover").is_none());
}

#[sqlx::test]
async fn stats_and_monthly_plan(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    create_tour(&client, &address, &token, tour_payload("The Forest Hiker", 397.0)).await;
    create_tour(&client, &address, &token, tour_payload("The Sea Explorer", 497.0)).await;

    let response = client
        .get(format!("{address}/api/v1/tours/tour-stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let stats = &body["data"]["data"][0];
    assert_eq!(stats["difficulty"], "EASY");
    assert_eq!(stats["numTours"], 2);
    assert_eq!(stats["avgPrice"], 447.0);
    assert_eq!(stats["minPrice"], 397.0);

    let response = client
        .get(format!("{address}/api/v1/tours/monthly-plan/2031"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let plan = body["data"]["data"].as_array().unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0]["numTourStarts"], 2);
    assert_eq!(
        plan[0]["tours"],
        json!(["The Forest Hiker", "The Sea Explorer"])
    );
}

#[sqlx::test]
async fn geo_queries(pool: PgPool) {
    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();
    let token = staff(&client, &address, &pool).await;

    // Starts in Banff
    create_tour(&client, &address, &token, tour_payload("The Forest Hiker", 397.0)).await;
    // Starts in Miami
    let mut miami = tour_payload("The Sea Explorer", 497.0);
    miami["startLocation"] = json!({
        "type": "Point",
        "coordinates": [-80.185942, 25.774772],
        "description": "Miami, USA"
    });
    create_tour(&client, &address, &token, miami).await;

    // Calgary is roughly 110 km from Banff
    let response = client
        .get(format!(
            "{address}/api/v1/tours/tours-within/200/center/51.0447,-114.0719/unit/km"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["data"][0]["name"], "The Forest Hiker");

    let response = client
        .get(format!("{address}/api/v1/tours/distances/51.0447,-114.0719/unit/km"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let rows = body["data"]["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "The Forest Hiker");
    let near = rows[0]["distance"].as_f64().unwrap();
    assert!((90.0..130.0).contains(&near), "unexpected distance {near}");

    let response = client
        .get(format!("{address}/api/v1/tours/distances/51.0447/unit/km"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn tours_within_returns_every_tour_in_radius(pool: PgPool) {
    // 120 tours starting in Banff, more than one default page
    sqlx::query(
        "INSERT INTO tours (name, slug, duration, max_group_size, difficulty, price, summary, \
         image_cover, start_location) \
         SELECT 'Banff Day Hike ' || lpad(i::text, 3, '0'), 'banff-day-hike-' || i, 1, 10, \
           'easy', 99, 'A day in the park', 'cover.jpg', \
           '{\"type\": \"Point\", \"coordinates\": [-115.570154, 51.178456]}'::jsonb \
         FROM generate_series(1, 120) AS i",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (address, _) = spawn_app(pool.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!(
            "{address}/api/v1/tours/tours-within/200/center/51.0447,-114.0719/unit/km"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 120);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 120);
}
