//! # Authentication Middleware
//!
//! This module contains the middleware chain that resolves the caller behind a
//! JWT and gates routes by role.
//!
//! - [`protect`] rejects requests without a valid, fresh token of an active account
//! - [`is_logged_in`] resolves the caller for pages and never rejects
//! - [`restrict_to`] runs after [`protect`] and checks the caller's role

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AppState, Role, User};
use crate::services::jwt::JwtError;
use crate::utils::constant::{JWT_COOKIE, LOGGED_OUT_SENTINEL};

/// The authenticated account, inserted by [`protect`].
///
/// # Usage in Handlers
///
/// ```ignore
/// async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> impl IntoResponse {
///     format!("Hello {}", user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The caller of a page route, if logged in. Inserted by [`is_logged_in`].
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

/// Roles admitted by one [`restrict_to`] layer.
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

/// Authentication middleware for protecting routes
///
/// # Authentication Flow
///
/// 1. Takes the token from `Authorization: Bearer <token>`, falling back to the `jwt` cookie
/// 2. Validates the JWT token signature and expiration
/// 3. Loads the active account named by the token subject
/// 4. Rejects tokens issued before the account's last password change
/// 5. Adds [`CurrentUser`] to request extensions for handler access
///
/// # Returns
///
/// - **Success**: Continues to next handler with user context
/// - **Failure**: `401 Unauthorized` with a message naming the failed step
#[instrument(
    skip_all,
    fields(
        method = %req.method(),
        uri = %req.uri(),
    )
)]
pub async fn protect(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    trace!("Processing authentication middleware");

    let Some(token) = extract_token(req.headers()) else {
        warn!("Missing token");
        return Err(AppError::unauthorized(
            "You are not logged in! Please log in to get access.",
        ));
    };

    let user = resolve_user(&state, &token).await?;
    debug!(user_id = %user.id, role = user.role.as_str(), "Authentication successful");

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Resolves the caller for page rendering. Every failure yields an anonymous viewer.
#[instrument(skip_all, fields(uri = %req.uri()))]
pub async fn is_logged_in(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = match extract_token(req.headers()) {
        Some(token) => match resolve_user(&state, &token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Ignoring invalid session on page request");
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(Viewer(viewer));
    next.run(req).await
}

/// Role gate. Must be layered inside [`protect`].
///
/// ```ignore
/// Router::new()
///     .route("/", post(create_tour))
///     .route_layer(from_fn_with_state(AllowedRoles(&[Role::Admin]), restrict_to))
///     .route_layer(from_fn_with_state(state, protect))
/// ```
pub async fn restrict_to(
    State(AllowedRoles(roles)): State<AllowedRoles>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let allowed = match req.extensions().get::<CurrentUser>() {
        Some(CurrentUser(user)) => roles.contains(&user.role),
        None => {
            return Err(AppError::unauthorized(
                "You are not logged in! Please log in to get access.",
            ));
        }
    };

    if !allowed {
        warn!(uri = %req.uri(), "Role not permitted");
        return Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ));
    }
    Ok(next.run(req).await)
}

/// Bearer header first, then the session cookie unless it holds the logout sentinel.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        trace!("Extracted bearer token from Authorization header");
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(JWT_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty() && v != LOGGED_OUT_SENTINEL)
}

async fn resolve_user(state: &AppState, token: &str) -> AppResult<User> {
    let claims = state.jwt_service.verify(token)?;
    let user_id = Uuid::try_parse(&claims.sub).map_err(|_| AppError::Token(JwtError::InvalidToken))?;

    let user = User::find_active_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("The user belonging to this token no longer exists."))?;

    if user.changed_password_after(claims.iat) {
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("def"));
    }

    #[test]
    fn logout_sentinel_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=loggedout"));
        assert_eq!(extract_token(&headers), None);
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
