//! # Review Handlers
//!
//! Every write runs in a transaction together with the tour rating
//! recalculation, so the aggregate on the tour always reflects the committed
//! reviews. Reviews are also reachable nested under a tour:
//! `/api/v1/tours/{id}/reviews`.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::factory::{self, NO_DOCUMENT_MESSAGE};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::{CurrentUser, RequestTime};
use crate::models::{AppState, REVIEWS, Role, User};
use crate::services::rating::recalculate_tour_rating;
use crate::utils::query::{QueryFeatures, QueryParams};
use crate::utils::validator::{not_blank, parse_uuid};

/// Request payload for writing a review
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(custom(function = "not_blank"))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub rating: f64,
    /// Taken from the path on the nested route.
    pub tour: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(custom(function = "not_blank"))]
    pub review: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub rating: Option<f64>,
}

/// Lists reviews, optionally of one tour.
async fn list_reviews(
    state: &AppState,
    tour_id: Option<Uuid>,
    params: Vec<(String, String)>,
    requested_at: RequestTime,
) -> AppResult<impl IntoResponse + use<>> {
    let params = QueryParams::from(params);
    let base = match tour_id {
        Some(tour_id) => QueryFeatures::new(&REVIEWS).scoped("r.tour_id", tour_id),
        None => QueryFeatures::new(&REVIEWS),
    };
    let docs = factory::get_all(&state.db_pool, base, &params).await?;
    Ok(factory::list(docs, requested_at))
}

async fn insert_review(
    state: &AppState,
    author: &User,
    tour_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<impl IntoResponse + use<>> {
    payload.validate()?;

    let mut tx = state.db_pool.begin().await?;
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO reviews (review, rating, tour_id, user_id) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(payload.review.trim())
    .bind(payload.rating)
    .bind(tour_id)
    .bind(author.id)
    .fetch_one(&mut *tx)
    .await?;
    recalculate_tour_rating(&mut tx, tour_id).await?;
    tx.commit().await?;
    info!(%id, %tour_id, "Review created");

    let doc = factory::get_one(&state.db_pool, &REVIEWS, id).await?;
    Ok((StatusCode::CREATED, factory::single(doc)))
}

/// Fails unless the caller wrote the review or is an admin.
async fn ensure_owner(state: &AppState, user: &User, review_id: Uuid) -> AppResult<Uuid> {
    let row: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT user_id, tour_id FROM reviews WHERE id = $1")
            .bind(review_id)
            .fetch_optional(&state.db_pool)
            .await?;
    let (owner, tour_id) = row.ok_or_else(|| AppError::not_found(NO_DOCUMENT_MESSAGE))?;

    if owner != user.id && user.role != Role::Admin {
        warn!(user_id = %user.id, %review_id, "Attempt to modify another user's review");
        return Err(AppError::forbidden("You can only modify your own reviews"));
    }
    Ok(tour_id)
}

#[instrument(skip(state, requested_at))]
pub async fn get_all_reviews(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    list_reviews(&state, None, params, requested_at).await
}

#[instrument(skip(state, requested_at))]
pub async fn get_tour_reviews(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Path(tour_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let tour_id = parse_uuid("id", &tour_id)?;
    list_reviews(&state, Some(tour_id), params, requested_at).await
}

#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    let doc = factory::get_one(&state.db_pool, &REVIEWS, id).await?;
    Ok(factory::single(doc))
}

/// Creates a review authored by the caller. The tour comes from the body.
///
/// # Returns
///
/// - `201 Created` - The new review
/// - `400 Bad Request` - Missing tour, invalid rating or unknown tour
/// - `409 Conflict` - The caller already reviewed this tour
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let tour = payload
        .tour
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Review must belong to a tour."))?;
    let tour_id = parse_uuid("tour", tour)?;
    insert_review(&state, &user, tour_id, payload).await
}

/// Creates a review of the tour named in the path.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_tour_review(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let tour_id = parse_uuid("id", &tour_id)?;
    insert_review(&state, &user, tour_id, payload).await
}

#[instrument(skip_all, fields(user_id = %user.id, review_id = %id))]
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    payload.validate()?;
    let tour_id = ensure_owner(&state, &user, id).await?;

    let mut tx = state.db_pool.begin().await?;
    sqlx::query(
        "UPDATE reviews SET review = coalesce($1, review), rating = coalesce($2, rating), \
         version = version + 1 WHERE id = $3",
    )
    .bind(payload.review.as_deref().map(str::trim))
    .bind(payload.rating)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    recalculate_tour_rating(&mut tx, tour_id).await?;
    tx.commit().await?;
    debug!("Review updated");

    let doc = factory::get_one(&state.db_pool, &REVIEWS, id).await?;
    Ok(factory::single(doc))
}

#[instrument(skip_all, fields(user_id = %user.id, review_id = %id))]
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_uuid("id", &id)?;
    let tour_id = ensure_owner(&state, &user, id).await?;

    let mut tx = state.db_pool.begin().await?;
    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    recalculate_tour_rating(&mut tx, tour_id).await?;
    tx.commit().await?;
    info!(%id, "Review deleted");

    Ok(StatusCode::NO_CONTENT)
}
