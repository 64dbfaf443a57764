//! # Authentication Handlers
//!
//! This module implements signup, login, logout and the password flows. The
//! authentication flow consists of:
//!
//! 1. Creating an account (or checking credentials on login)
//! 2. Issuing a signed JWT
//! 3. Returning it in the body and in an HTTP-only `jwt` cookie
//!
//! Password resets email a random token and store only its SHA-256 digest.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::CurrentUser;
use crate::models::{AppState, User};
use crate::services::email::{send_password_reset, send_welcome};
use crate::services::password::{hash_password, verify_password};
use crate::utils::constant::*;
use crate::utils::validator::digest_token;

/// Request payload for creating an account
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 40, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(
        length(min = 8, message = "A password must have at least 8 characters"),
        must_match(other = "password_confirm", message = "Passwords are not the same!")
    )]
    pub password: String,
    pub password_confirm: String,
}

/// Request payload for logging in. Both fields are checked by hand so a missing
/// field gets its own message.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Request payload for setting a password through a reset link
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(
        length(min = 8, message = "A password must have at least 8 characters"),
        must_match(other = "password_confirm", message = "Passwords are not the same!")
    )]
    pub password: String,
    pub password_confirm: String,
}

/// Request payload for changing the password of the logged-in account
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    #[validate(
        length(min = 8, message = "A password must have at least 8 characters"),
        must_match(other = "password_confirm", message = "Passwords are not the same!")
    )]
    pub password: String,
    pub password_confirm: String,
}

/// Issues a token for `user` and sends it in the body and the session cookie.
pub fn create_send_token(
    state: &AppState,
    user: User,
    status: StatusCode,
    jar: CookieJar,
) -> AppResult<(StatusCode, CookieJar, Json<Value>)> {
    let token = state.jwt_service.issue(user.id)?;

    let cookie = Cookie::build((JWT_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.environment.is_production())
        .expires(OffsetDateTime::now_utc() + state.config.jwt_cookie_expires_in);

    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": user },
    });
    Ok((status, jar.add(cookie), Json(body)))
}

/// Creates an account and logs it in.
///
/// # Returns
///
/// - `201 Created` - Account created, token issued
/// - `400 Bad Request` - Invalid payload
/// - `409 Conflict` - Email already registered
#[instrument(
    skip(state, jar, payload),
    fields(
        email = %payload.email,
        request_id = %uuid::Uuid::new_v4()
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    debug!("Processing signup request");

    // 1. Validate input
    payload.validate()?;

    // 2. Hash and store
    let password_hash = hash_password(payload.password).await?;
    let user = User::create(&state.db_pool, &payload.name, &payload.email, &password_hash).await?;
    info!(user_id = %user.id, "Account created");

    // 3. Welcome email, best effort
    let account_url = format!("{}/me", state.config.public_url);
    if let Err(e) = send_welcome(state.email_service.as_ref(), &user, &account_url).await {
        error!(error = %e, "Failed to send welcome email");
    }

    create_send_token(&state, user, StatusCode::CREATED, jar)
}

/// Checks credentials and issues a token.
///
/// # Returns
///
/// - `200 OK` - Logged in
/// - `400 Bad Request` - Email or password missing
/// - `401 Unauthorized` - Unknown email or wrong password
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(AppError::bad_request("Please provide email and password!"));
    };

    let incorrect = || AppError::unauthorized("Incorrect email or password");

    let Some(user) = User::find_active_by_email(&state.db_pool, &email).await? else {
        warn!("Login attempt for unknown email");
        return Err(incorrect());
    };

    if !verify_password(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "Wrong password");
        return Err(incorrect());
    }

    debug!(user_id = %user.id, "Login successful");
    create_send_token(&state, user, StatusCode::OK, jar)
}

/// Replaces the session cookie with a short-lived sentinel.
#[instrument(skip_all)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((JWT_COOKIE, LOGGED_OUT_SENTINEL))
        .path("/")
        .http_only(true)
        .expires(OffsetDateTime::now_utc() + LOGOUT_COOKIE_EXPIRY);

    (jar.add(cookie), Json(json!({ "status": "success" })))
}

/// Emails a password reset link.
///
/// # Returns
///
/// - `200 OK` - Reset link sent
/// - `404 Not Found` - No account with that email
/// - `500 Internal Server Error` - The email could not be sent; the token is discarded
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    // 1. Find the account
    let email = payload.email.unwrap_or_default();
    let Some(user) = User::find_active_by_email(&state.db_pool, &email).await? else {
        return Err(AppError::not_found("There is no user with that email address."));
    };

    // 2. Generate and store the token digest
    let token = hex::encode(rand::random::<[u8; 32]>());
    let expires = OffsetDateTime::now_utc() + PASSWORD_RESET_EXPIRY;
    User::set_reset_token(&state.db_pool, user.id, Some((&digest_token(&token), expires))).await?;
    debug!(user_id = %user.id, "Stored password reset token");

    // 3. Send it
    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{token}",
        state.config.public_url
    );
    if let Err(e) = send_password_reset(state.email_service.as_ref(), &user, &reset_url).await {
        error!(error = %e, "Failed to send password reset email");
        User::set_reset_token(&state.db_pool, user.id, None).await?;
        return Err(AppError::Operational {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "There was an error sending the email. Try again later!".to_string(),
        });
    }

    info!(user_id = %user.id, "Password reset email sent");
    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!",
    })))
}

/// Sets a new password using an emailed reset token, then logs in.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    jar: CookieJar,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    let Some(user) = User::find_by_reset_token(&state.db_pool, &digest_token(&token)).await? else {
        warn!("Invalid or expired reset token");
        return Err(AppError::bad_request("Token is invalid or has expired"));
    };

    payload.validate()?;

    let password_hash = hash_password(payload.password).await?;
    User::set_password(&state.db_pool, user.id, &password_hash).await?;
    info!(user_id = %user.id, "Password reset");

    create_send_token(&state, user, StatusCode::OK, jar)
}

/// Changes the password of the logged-in account, then issues a fresh token.
///
/// # Returns
///
/// - `200 OK` - Password changed
/// - `400 Bad Request` - Invalid new password
/// - `401 Unauthorized` - Current password is wrong
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    jar: CookieJar,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    if !verify_password(payload.password_current.clone(), user.password_hash.clone()).await? {
        warn!("Wrong current password");
        return Err(AppError::unauthorized("Your current password is wrong."));
    }

    payload.validate()?;

    let password_hash = hash_password(payload.password).await?;
    User::set_password(&state.db_pool, user.id, &password_hash).await?;
    info!("Password updated");

    create_send_token(&state, user, StatusCode::OK, jar)
}
