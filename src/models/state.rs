use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::Config;
use crate::middleware::RateLimiter;
use crate::services::{email::EmailService, jwt::JwtService};

/// Application state shared across requests. Needs to be thread-safe.
pub struct AppState {
    /// Settings loaded at startup.
    pub config: Config,
    /// The PostgreSQL database connection pool.
    pub db_pool: PgPool,
    /// JWT service for token generation and validation.
    pub jwt_service: JwtService,
    /// The email service used for welcome and password reset emails.
    pub email_service: Arc<dyn EmailService>,
    /// Per-IP request windows for the API rate limit.
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Creates a new application state with the provided services.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration
    /// * `db_pool` - PostgreSQL database connection pool
    /// * `email_service` - Service for sending account emails
    pub fn new(config: Config, db_pool: PgPool, email_service: Arc<dyn EmailService>) -> Self {
        info!(environment = ?config.environment, "Initializing application state");
        debug!(
            max_requests = config.rate_limit.max_requests,
            window_secs = config.rate_limit.window.as_secs(),
            "Creating rate limiter"
        );

        let jwt_service = JwtService::new(
            config.jwt_secret.expose_secret().as_bytes(),
            config.jwt_expires_in,
        );
        let rate_limiter = RateLimiter::new(config.rate_limit);

        Self {
            config,
            db_pool,
            jwt_service,
            email_service,
            rate_limiter,
        }
    }
}
