//! # Account Handlers
//!
//! Self-service endpoints for the logged-in account (`/me`, `/updateMe`,
//! `/deleteMe`) and the admin account endpoints. Deleting an account never
//! removes the row; it only deactivates it.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::factory::{self, NO_DOCUMENT_MESSAGE};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::{CurrentUser, RequestTime};
use crate::models::{AppState, Role, USERS, User};
use crate::utils::query::{QueryFeatures, QueryParams};
use crate::utils::validator::parse_uuid;

/// Fields an account may change about itself
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 40, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    /// Rejected when present.
    pub password: Option<Value>,
    /// Rejected when present.
    pub password_confirm: Option<Value>,
}

/// Fields an admin may change about any account
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 40, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub role: Option<Role>,
    #[validate(length(min = 1))]
    pub photo: Option<String>,
}

/// Partial update of an active account's profile columns.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub photo: Option<String>,
}

/// Applies `changes` to the active account `id`.
///
/// # Errors
///
/// `404` when the account does not exist or is inactive, `409` on a taken email.
pub async fn apply_profile_changes(pool: &PgPool, id: Uuid, changes: ProfileChanges) -> AppResult<()> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET version = version + 1");
    if let Some(name) = changes.name {
        qb.push(", name = ").push_bind(name.trim().to_string());
    }
    if let Some(email) = changes.email {
        qb.push(", email = ").push_bind(email.trim().to_lowercase());
    }
    if let Some(role) = changes.role {
        qb.push(", role = ").push_bind(role);
    }
    if let Some(photo) = changes.photo {
        qb.push(", photo = ").push_bind(photo);
    }
    qb.push(" WHERE active AND id = ").push_bind(id);

    let result = qb.build().execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(NO_DOCUMENT_MESSAGE));
    }
    Ok(())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let doc = factory::get_one(&state.db_pool, &USERS, user.id).await?;
    Ok(factory::single(doc))
}

/// Updates name and email of the logged-in account.
///
/// # Returns
///
/// - `200 OK` - Updated account
/// - `400 Bad Request` - Password fields present, or invalid values
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(payload): AppJson<UpdateMeRequest>,
) -> AppResult<impl IntoResponse> {
    // 1. Password changes have their own route
    if payload.password.is_some() || payload.password_confirm.is_some() {
        return Err(AppError::bad_request(
            "This route is not for password updates. Please use /updateMyPassword.",
        ));
    }

    // 2. Validate and apply only the whitelisted fields
    payload.validate()?;
    let changes = ProfileChanges {
        name: payload.name,
        email: payload.email,
        ..Default::default()
    };
    apply_profile_changes(&state.db_pool, user.id, changes).await?;
    debug!("Profile updated");

    let doc = factory::get_one(&state.db_pool, &USERS, user.id).await?;
    Ok(factory::single(doc))
}

/// Deactivates the logged-in account.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<StatusCode> {
    User::deactivate(&state.db_pool, user.id).await?;
    info!("Account deactivated by owner");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, requested_at))]
pub async fn get_all_users(
    State(state): State<Arc<AppState>>,
    Extension(requested_at): Extension<RequestTime>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let params = QueryParams::from(params);
    let docs = factory::get_all(&state.db_pool, QueryFeatures::new(&USERS), &params).await?;
    Ok(factory::list(docs, requested_at))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    let doc = factory::get_one(&state.db_pool, &USERS, id).await?;
    Ok(factory::single(doc))
}

/// Accounts are created through `/signup` only.
pub async fn create_user() -> AppError {
    AppError::Operational {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "This route is not defined! Please use /signup instead".to_string(),
    }
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let id = parse_uuid("id", &id)?;
    payload.validate()?;

    let changes = ProfileChanges {
        name: payload.name,
        email: payload.email,
        role: payload.role,
        photo: payload.photo,
    };
    apply_profile_changes(&state.db_pool, id, changes).await?;
    info!(%id, "Account updated by admin");

    let doc = factory::get_one(&state.db_pool, &USERS, id).await?;
    Ok(factory::single(doc))
}

/// Deactivates an account.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_uuid("id", &id)?;
    if !User::deactivate(&state.db_pool, id).await? {
        return Err(AppError::not_found(NO_DOCUMENT_MESSAGE));
    }
    info!(%id, "Account deactivated by admin");
    Ok(StatusCode::NO_CONTENT)
}
