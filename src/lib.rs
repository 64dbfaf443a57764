//! # Natours - Tour Booking Backend
//!
//! ## Modules
//!
//! - [`config`] - Typed settings loaded once at startup
//! - [`error`] - The application error type and its classification
//! - [`handlers`] - HTTP request handlers for the API and the pages
//! - [`middleware`] - Authentication, rate limiting and error rendering
//! - [`models`] - Rows, collections and shared state
//! - [`services`] - Business logic services (email, JWT, passwords, ratings)
//! - [`utils`] - Query shaping, HTML rendering and helpers

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
};
use sqlx::PgPool;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::handlers::*;
use crate::middleware::{
    AllowedRoles, handle_panic, is_logged_in, protect, rate_limit, render_errors, restrict_to,
    stamp_request_time,
};
use crate::models::{AppState, Role};
use crate::services::email::{EmailService, ExternalEmailer, LogEmailer};
use crate::utils::constant::*;

const ADMIN: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];
const GUIDES: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
const REVIEWERS: &[Role] = &[Role::User];
const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

/// Creates the router with the email transport chosen from `config`.
///
/// A configured mail API selects [`ExternalEmailer`]; otherwise emails are only
/// logged through [`LogEmailer`].
pub fn app(config: Config, db_pool: PgPool) -> Router {
    let email_service: Arc<dyn EmailService> = match &config.mail {
        Some(mail) => {
            info!("Using [ExternalEmailer]");
            Arc::new(ExternalEmailer::new(
                mail.api_url.clone(),
                mail.api_key.clone(),
                mail.sender.clone(),
            ))
        }
        None => {
            info!("No mail API configured, using [LogEmailer (Mock)]");
            Arc::new(LogEmailer)
        }
    };
    app_with_email_service(config, db_pool, email_service)
}

/// Creates the router with application routes, state and middleware.
///
/// # Arguments
///
/// * `config` - Settings; the environment drives error verbosity and cookie flags
/// * `db_pool` - PostgreSQL database connection pool
/// * `email_service` - Transport for welcome and password reset emails
///
/// Spawns the background task that purges stale rate limit windows, so it must
/// be called inside a tokio runtime.
pub fn app_with_email_service(
    config: Config,
    db_pool: PgPool,
    email_service: Arc<dyn EmailService>,
) -> Router {
    let environment = config.environment;
    let static_dir = config.static_dir.clone();
    let state = Arc::new(AppState::new(config, db_pool, email_service));

    let state_clone = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            state_clone.rate_limiter.cleanup_expired_entries();
        }
    });

    // Users
    let public_users = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/signout", get(logout))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/{token}", patch(reset_password));
    let own_account = Router::new()
        .route("/me", get(get_me))
        .route("/updateMyPassword", patch(update_password))
        .route("/updateMe", patch(update_me))
        .route("/deleteMe", delete(delete_me))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let user_admin = Router::new()
        .route("/", get(get_all_users).post(create_user))
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route_layer(from_fn_with_state(AllowedRoles(ADMIN), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let users = public_users.merge(own_account).merge(user_admin);

    // Tours
    let public_tours = Router::new()
        .route("/", get(get_all_tours))
        .route("/top-5-cheap", get(top_tours))
        .route("/tour-stats", get(tour_stats))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(distances))
        .route("/{id}", get(get_tour));
    let tour_writes = Router::new()
        .route("/", post(create_tour))
        .route("/{id}", patch(update_tour).delete(delete_tour))
        .route_layer(from_fn_with_state(AllowedRoles(STAFF), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let tour_plan = Router::new()
        .route("/monthly-plan/{year}", get(monthly_plan))
        .route_layer(from_fn_with_state(AllowedRoles(GUIDES), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let nested_review_list = Router::new()
        .route("/{id}/reviews", get(get_tour_reviews))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let nested_review_create = Router::new()
        .route("/{id}/reviews", post(create_tour_review))
        .route_layer(from_fn_with_state(AllowedRoles(REVIEWERS), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let tours = public_tours
        .merge(tour_writes)
        .merge(tour_plan)
        .merge(nested_review_list)
        .merge(nested_review_create);

    // Reviews
    let review_reads = Router::new()
        .route("/", get(get_all_reviews))
        .route("/{id}", get(get_review))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let review_create = Router::new()
        .route("/", post(create_review))
        .route_layer(from_fn_with_state(AllowedRoles(REVIEWERS), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let review_edits = Router::new()
        .route("/{id}", patch(update_review).delete(delete_review))
        .route_layer(from_fn_with_state(AllowedRoles(REVIEW_EDITORS), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));
    let reviews = review_reads.merge(review_create).merge(review_edits);

    // Bookings
    let bookings = Router::new()
        .route("/", get(get_all_bookings).post(create_booking))
        .route(
            "/{id}",
            get(get_booking).patch(update_booking).delete(delete_booking),
        )
        .route_layer(from_fn_with_state(AllowedRoles(STAFF), restrict_to))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));

    let api = Router::new()
        .nest("/api/v1/users", users)
        .nest("/api/v1/tours", tours)
        .nest("/api/v1/reviews", reviews)
        .nest("/api/v1/bookings", bookings)
        .route_layer(from_fn_with_state(Arc::clone(&state), rate_limit));

    // Pages
    let public_pages = Router::new()
        .route("/", get(overview))
        .route("/tour/{slug}", get(get_tour_page))
        .route("/login", get(login_page))
        .route_layer(from_fn_with_state(Arc::clone(&state), is_logged_in));
    let account_pages = Router::new()
        .route("/me", get(account))
        .route("/my-tours", get(my_tours))
        .route("/submit-user-data", post(submit_user_data))
        .route_layer(from_fn_with_state(Arc::clone(&state), protect));

    Router::new()
        .route("/health-check", get(health_check))
        .merge(api)
        .merge(public_pages)
        .merge(account_pages)
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(route_not_found)
        .with_state(state)
        .layer(from_fn(stamp_request_time))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(from_fn_with_state(environment, render_errors))
}

async fn route_not_found(req: Request) -> AppError {
    AppError::not_found(format!("Can't find {} on this server!", req.uri()))
}
