//! Booking administration. Every route here sits behind `protect` and is
//! restricted to admins and lead guides.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::factory::{self, NO_DOCUMENT_MESSAGE};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::RequestTime;
use crate::models::{AppState, BOOKINGS};
use crate::utils::query::{QueryFeatures, QueryParams};
use crate::utils::validator::parse_uuid;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub tour: Uuid,
    pub user: Uuid,
    #[validate(range(min = 0.0, message = "Booking must have a price."))]
    pub price: f64,
    #[serde(default = "paid_by_default")]
    pub paid: bool,
}

fn paid_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    #[validate(range(min = 0.0, message = "Booking must have a price."))]
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

#[instrument(skip(state, requested_at))]
pub async fn get_all_bookings(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let params = QueryParams::from(params);
    let docs = factory::get_all(&state.db_pool, QueryFeatures::new(&BOOKINGS), &params).await?;
    Ok(factory::list(docs, requested_at))
}

#[instrument(skip(state))]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    let doc = factory::get_one(&state.db_pool, &BOOKINGS, id).await?;
    Ok(factory::single(doc))
}

/// Records a booking of `tour` for `user`.
///
/// # Returns
///
/// - `201 Created` - The new booking
/// - `400 Bad Request` - Invalid price, unknown tour or unknown account
#[instrument(skip_all, fields(tour_id = %payload.tour, user_id = %payload.user))]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO bookings (tour_id, user_id, price, paid) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(payload.tour)
    .bind(payload.user)
    .bind(payload.price)
    .bind(payload.paid)
    .fetch_one(&state.db_pool)
    .await?;
    info!(%id, "Booking created");

    let doc = factory::get_one(&state.db_pool, &BOOKINGS, id).await?;
    Ok((StatusCode::CREATED, factory::single(doc)))
}

#[instrument(skip(state, payload))]
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    payload.validate()?;

    let result = sqlx::query(
        "UPDATE bookings SET price = coalesce($1, price), paid = coalesce($2, paid), \
         version = version + 1 WHERE id = $3",
    )
    .bind(payload.price)
    .bind(payload.paid)
    .bind(id)
    .execute(&state.db_pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(NO_DOCUMENT_MESSAGE));
    }

    let doc = factory::get_one(&state.db_pool, &BOOKINGS, id).await?;
    Ok(factory::single(doc))
}

#[instrument(skip(state))]
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_uuid("id", &id)?;
    factory::delete_one(&state.db_pool, "bookings", id).await?;
    info!(%id, "Booking deleted");
    Ok(StatusCode::NO_CONTENT)
}
