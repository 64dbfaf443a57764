//! # Tour Handlers
//!
//! CRUD over tours plus the aggregation and geo endpoints. Reads go through the
//! [`TOURS`] collection so every response shares one projection; writes use
//! explicit SQL inside a transaction when guides are touched.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::factory;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::RequestTime;
use crate::models::{
    AppState, Difficulty, Location, MonthlyPlan, REVIEWS, START_LAT_EXPR, START_LNG_EXPR, TOURS,
    TourDistance, TourStats,
};
use crate::utils::constant::{EARTH_RADIUS_KM, EARTH_RADIUS_MI, TOUR_STATS_MIN_RATING};
use crate::utils::query::{QueryFeatures, QueryParams};
use crate::utils::validator::{not_blank, parse_lat_lng, parse_uuid, slugify};

/// A start date in RFC 3339.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StartDate(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

/// Request payload for creating a tour
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_discount"))]
pub struct CreateTourRequest {
    #[validate(
        length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity must not be negative"))]
    pub ratings_quantity: Option<i32>,
    #[validate(range(min = 0.0, message = "Price must not be negative"))]
    pub price: f64,
    pub price_discount: Option<f64>,
    #[validate(custom(function = "not_blank"))]
    pub summary: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<StartDate>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Option<Location>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

fn validate_discount(tour: &CreateTourRequest) -> Result<(), ValidationError> {
    match tour.price_discount {
        Some(discount) if discount >= tour.price => Err(ValidationError::new("price_discount")
            .with_message(Cow::Owned(format!(
                "Discount price ({discount}) should be below regular price"
            )))),
        _ => Ok(()),
    }
}

/// Request payload for partially updating a tour. The discount rule is
/// enforced by the `tours_price_discount_check` constraint.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTourRequest {
    #[validate(
        length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 0.0, message = "Price must not be negative"))]
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    #[validate(custom(function = "not_blank"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<StartDate>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<Location>,
    pub locations: Option<Vec<Location>>,
    pub guides: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DistanceUnit {
    Miles,
    Kilometres,
}

impl DistanceUnit {
    fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Kilometres),
            _ => Err(AppError::bad_request("Please provide the unit as mi or km.")),
        }
    }

    fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => EARTH_RADIUS_MI,
            DistanceUnit::Kilometres => EARTH_RADIUS_KM,
        }
    }
}

async fn replace_guides(conn: &mut PgConnection, tour_id: Uuid, guides: &[Uuid]) -> AppResult<()> {
    sqlx::query("DELETE FROM tour_guides WHERE tour_id = $1")
        .bind(tour_id)
        .execute(&mut *conn)
        .await?;

    for (position, guide_id) in guides.iter().enumerate() {
        sqlx::query("INSERT INTO tour_guides (tour_id, user_id, position) VALUES ($1, $2, $3)")
            .bind(tour_id)
            .bind(guide_id)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[instrument(skip(state, requested_at))]
pub async fn get_all_tours(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let params = QueryParams::from(params);
    let docs = factory::get_all(&state.db_pool, QueryFeatures::new(&TOURS), &params).await?;
    Ok(factory::list(docs, requested_at))
}

/// The five best rated, cheapest tours.
#[instrument(skip(state, requested_at))]
pub async fn top_tours(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let params = QueryParams::from(params)
        .with("limit", "5")
        .with("sort", "-ratingsAverage,price")
        .with("fields", "name,price,ratingsAverage,summary,difficulty");
    let docs = factory::get_all(&state.db_pool, QueryFeatures::new(&TOURS), &params).await?;
    Ok(factory::list(docs, requested_at))
}

/// A tour with its guides and reviews.
#[instrument(skip(state))]
pub async fn get_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    let mut doc = QueryFeatures::new(&TOURS)
        .fetch_by_id(&state.db_pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("No tour found with that ID"))?;

    let reviews = QueryFeatures::new(&REVIEWS)
        .scoped("r.tour_id", id)
        .fetch_unpaged(&state.db_pool)
        .await?;
    doc["reviews"] = json!(reviews);

    Ok(factory::single(doc))
}

/// Creates a tour and its guide assignments.
///
/// # Returns
///
/// - `201 Created` - The new tour
/// - `400 Bad Request` - Invalid payload or unknown guide
/// - `409 Conflict` - Name already taken
#[instrument(skip_all, fields(name = %payload.name))]
pub async fn create_tour(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateTourRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let start_dates: Vec<OffsetDateTime> = payload.start_dates.iter().map(|d| d.0).collect();

    let mut tx = state.db_pool.begin().await?;

    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO tours (name, slug, duration, max_group_size, difficulty, ratings_average, \
         ratings_quantity, price, price_discount, summary, description, image_cover, images, \
         start_dates, secret, start_location, locations) \
         VALUES ($1, $2, $3, $4, $5, coalesce($6, 4.5), coalesce($7, 0), $8, $9, $10, $11, $12, \
         $13, $14, $15, $16, $17) \
         RETURNING id",
    )
    .bind(payload.name.trim())
    .bind(slugify(&payload.name))
    .bind(payload.duration)
    .bind(payload.max_group_size)
    .bind(payload.difficulty)
    .bind(payload.ratings_average.map(|r| (r * 10.0).round() / 10.0))
    .bind(payload.ratings_quantity)
    .bind(payload.price)
    .bind(payload.price_discount)
    .bind(payload.summary.trim())
    .bind(payload.description.as_deref().map(str::trim))
    .bind(&payload.image_cover)
    .bind(&payload.images)
    .bind(&start_dates)
    .bind(payload.secret_tour)
    .bind(payload.start_location.map(Json))
    .bind(Json(&payload.locations))
    .fetch_one(&mut *tx)
    .await?;

    replace_guides(&mut tx, id, &payload.guides).await?;
    tx.commit().await?;
    info!(%id, "Tour created");

    let doc = factory::get_one(&state.db_pool, &TOURS, id).await?;
    Ok((StatusCode::CREATED, factory::single(doc)))
}

/// Partially updates a tour. A new name re-derives the slug.
#[instrument(skip(state, payload))]
pub async fn update_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateTourRequest>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    payload.validate()?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE tours SET version = version + 1");
    if let Some(name) = &payload.name {
        qb.push(", name = ").push_bind(name.trim().to_string());
        qb.push(", slug = ").push_bind(slugify(name));
    }
    if let Some(duration) = payload.duration {
        qb.push(", duration = ").push_bind(duration);
    }
    if let Some(size) = payload.max_group_size {
        qb.push(", max_group_size = ").push_bind(size);
    }
    if let Some(difficulty) = payload.difficulty {
        qb.push(", difficulty = ").push_bind(difficulty);
    }
    if let Some(price) = payload.price {
        qb.push(", price = ").push_bind(price);
    }
    if let Some(discount) = payload.price_discount {
        qb.push(", price_discount = ").push_bind(discount);
    }
    if let Some(summary) = &payload.summary {
        qb.push(", summary = ").push_bind(summary.trim().to_string());
    }
    if let Some(description) = &payload.description {
        qb.push(", description = ").push_bind(description.trim().to_string());
    }
    if let Some(cover) = payload.image_cover {
        qb.push(", image_cover = ").push_bind(cover);
    }
    if let Some(images) = payload.images {
        qb.push(", images = ").push_bind(images);
    }
    if let Some(dates) = payload.start_dates {
        let dates: Vec<OffsetDateTime> = dates.into_iter().map(|d| d.0).collect();
        qb.push(", start_dates = ").push_bind(dates);
    }
    if let Some(secret) = payload.secret_tour {
        qb.push(", secret = ").push_bind(secret);
    }
    if let Some(location) = payload.start_location {
        qb.push(", start_location = ").push_bind(Json(location));
    }
    if let Some(locations) = payload.locations {
        qb.push(", locations = ").push_bind(Json(locations));
    }
    qb.push(" WHERE id = ").push_bind(id);

    let mut tx = state.db_pool.begin().await?;
    let result = qb.build().execute(&mut *tx).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("No tour found with that ID"));
    }
    if let Some(guides) = &payload.guides {
        replace_guides(&mut tx, id, guides).await?;
    }
    tx.commit().await?;
    debug!("Tour updated");

    let doc = factory::get_one(&state.db_pool, &TOURS, id).await?;
    Ok(factory::single(doc))
}

#[instrument(skip(state))]
pub async fn delete_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_uuid("id", &id)?;
    factory::delete_one(&state.db_pool, "tours", id).await?;
    info!(%id, "Tour deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Statistics of highly rated tours, grouped by difficulty.
#[instrument(skip(state))]
pub async fn tour_stats(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let stats: Vec<TourStats> = sqlx::query_as(
        "SELECT upper(difficulty::text) AS difficulty, count(*) AS num_tours, \
         coalesce(sum(ratings_quantity), 0)::int8 AS num_ratings, \
         avg(ratings_average)::float8 AS avg_rating, avg(price)::float8 AS avg_price, \
         min(price)::float8 AS min_price, max(price)::float8 AS max_price \
         FROM tours WHERE ratings_average >= $1 AND NOT secret \
         GROUP BY difficulty ORDER BY avg_price ASC",
    )
    .bind(TOUR_STATS_MIN_RATING)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(factory::single(stats))
}

/// Tour starts per month of `year`, busiest month first.
#[instrument(skip(state))]
pub async fn monthly_plan(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> AppResult<impl IntoResponse> {
    let year: i32 = year
        .parse()
        .ok()
        .filter(|y| (1..=9999).contains(y))
        .ok_or_else(|| AppError::bad_request(format!("Invalid year: {year}")))?;

    let plan: Vec<MonthlyPlan> = sqlx::query_as(
        "SELECT extract(month FROM d)::int4 AS month, count(*) AS num_tour_starts, \
         array_agg(t.name ORDER BY t.name) AS tours \
         FROM tours t CROSS JOIN LATERAL unnest(t.start_dates) AS d \
         WHERE NOT t.secret \
           AND d >= make_timestamptz($1, 1, 1, 0, 0, 0, 'UTC') \
           AND d < make_timestamptz($1 + 1, 1, 1, 0, 0, 0, 'UTC') \
         GROUP BY month ORDER BY num_tour_starts DESC, month ASC LIMIT 12",
    )
    .bind(year)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(factory::single(plan))
}

/// Every tour starting within `distance` of `latlng`. Not paginated.
#[instrument(skip(state, requested_at))]
pub async fn tours_within(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> AppResult<impl IntoResponse> {
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::bad_request(format!("Invalid distance: {distance}")))?;
    let center = parse_lat_lng(&latlng)?;
    let unit = DistanceUnit::parse(&unit)?;

    let docs = QueryFeatures::new(&TOURS)
        .within_radius((START_LAT_EXPR, START_LNG_EXPR), center, distance, unit.earth_radius())
        .fetch_unpaged(&state.db_pool)
        .await?;

    Ok(factory::list(docs, requested_at))
}

/// Distance from `latlng` to every tour's start, nearest first.
#[instrument(skip(state))]
pub async fn distances(
    State(state): State<Arc<AppState>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let (lat, lng) = parse_lat_lng(&latlng)?;
    let unit = DistanceUnit::parse(&unit)?;

    let rows: Vec<TourDistance> = sqlx::query_as(&format!(
        "SELECT t.id, t.name, haversine_distance($1, $2, {START_LAT_EXPR}, {START_LNG_EXPR}, $3) \
         AS distance FROM tours t \
         WHERE NOT t.secret AND t.start_location IS NOT NULL \
         ORDER BY distance ASC, t.id ASC"
    ))
    .bind(lat)
    .bind(lng)
    .bind(unit.earth_radius())
    .fetch_all(&state.db_pool)
    .await?;

    Ok(factory::single(rows))
}
