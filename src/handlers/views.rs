//! # Page Handlers
//!
//! Server-rendered HTML. Public pages run behind `is_logged_in` and receive a
//! [`Viewer`]; account pages run behind `protect` and receive a [`CurrentUser`].
//! Failures here are rendered as HTML error pages by the error responder.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    response::Html,
};
use serde::Deserialize;
use tracing::{debug, instrument};
use validator::Validate;

use super::users::{ProfileChanges, apply_profile_changes};
use crate::error::{AppError, AppResult};
use crate::extract::AppForm;
use crate::middleware::{CurrentUser, Viewer};
use crate::models::{AppState, TOUR_CARD_COLUMNS, TourCard, TourPage, User};
use crate::utils::html::{render_account, render_login, render_overview, render_tour_page};

/// Account settings form posted from `/me`
#[derive(Debug, Deserialize, Validate)]
pub struct UserDataForm {
    #[validate(length(min = 1, max = 40, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

#[instrument(skip_all)]
pub async fn overview(
    State(state): State<Arc<AppState>>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> AppResult<Html<String>> {
    let tours: Vec<TourCard> = sqlx::query_as(&format!(
        "SELECT {TOUR_CARD_COLUMNS} FROM tours t WHERE NOT t.secret \
         ORDER BY t.created_at DESC, t.id ASC"
    ))
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Html(render_overview("All Tours", &tours, viewer.as_ref())))
}

/// Detail page of the tour with `slug`, guides and reviews included.
#[instrument(skip(state, viewer))]
pub async fn get_tour_page(
    State(state): State<Arc<AppState>>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let tour: Option<TourPage> = sqlx::query_as(&format!(
        "SELECT {TOUR_CARD_COLUMNS}, t.description, t.images, t.locations, \
         coalesce((SELECT jsonb_agg(jsonb_build_object('name', u.name, 'photo', u.photo, \
             'role', u.role::text) ORDER BY g.position) \
           FROM tour_guides g JOIN users u ON u.id = g.user_id \
           WHERE g.tour_id = t.id AND u.active), '[]'::jsonb) AS guides, \
         coalesce((SELECT jsonb_agg(jsonb_build_object('review', r.review, 'rating', r.rating, \
             'name', u.name, 'photo', u.photo) ORDER BY r.created_at DESC) \
           FROM reviews r JOIN users u ON u.id = r.user_id \
           WHERE r.tour_id = t.id AND u.active), '[]'::jsonb) AS reviews \
         FROM tours t WHERE t.slug = $1 AND NOT t.secret"
    ))
    .bind(&slug)
    .fetch_optional(&state.db_pool)
    .await?;

    let tour = tour.ok_or_else(|| AppError::not_found("There is no tour with that name."))?;
    Ok(Html(render_tour_page(&tour, viewer.as_ref())))
}

pub async fn login_page(Extension(Viewer(viewer)): Extension<Viewer>) -> Html<String> {
    Html(render_login(viewer.as_ref()))
}

pub async fn account(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Html<String> {
    Html(render_account(&user, None))
}

/// Tours the logged-in account has booked.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn my_tours(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Html<String>> {
    let tours: Vec<TourCard> = sqlx::query_as(&format!(
        "SELECT {TOUR_CARD_COLUMNS} FROM tours t \
         WHERE t.id IN (SELECT b.tour_id FROM bookings b WHERE b.user_id = $1) \
         ORDER BY t.created_at DESC, t.id ASC"
    ))
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Html(render_overview("My Tours", &tours, Some(&user))))
}

/// Saves the account settings form and re-renders the page.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn submit_user_data(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppForm(form): AppForm<UserDataForm>,
) -> AppResult<Html<String>> {
    form.validate()?;

    let changes = ProfileChanges {
        name: Some(form.name),
        email: Some(form.email),
        ..Default::default()
    };
    apply_profile_changes(&state.db_pool, user.id, changes).await?;
    debug!("Account settings saved from page");

    let updated = User::find_active_by_id(&state.db_pool, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("The user belonging to this token no longer exists."))?;
    Ok(Html(render_account(&updated, Some("Your settings were saved."))))
}
