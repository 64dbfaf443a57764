//! # Application Constants
//!
//! This module defines configuration constants used throughout the Natours application.
//! These constants control default limits, token lifetimes and security settings that
//! are not worth exposing as environment variables.

use std::time::Duration;

/// Name of the cookie carrying the session JWT.
pub const JWT_COOKIE: &str = "jwt";

/// Sentinel value written into the session cookie on logout.
///
/// A cookie holding this value is treated as absent by the auth middleware.
pub const LOGGED_OUT_SENTINEL: &str = "loggedout";

/// Lifetime of the logout sentinel cookie.
pub const LOGOUT_COOKIE_EXPIRY: Duration = Duration::from_secs(10);

/// Expiration time for password reset tokens
///
/// The token is emailed to the user and must be used within this window.
pub const PASSWORD_RESET_EXPIRY: Duration = Duration::from_secs(10 * 60);

/// Default page number when `page` is absent or malformed.
pub const DEFAULT_PAGE: i64 = 1;

/// Default page size when `limit` is absent or malformed.
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Upper bound for the `limit` query parameter.
///
/// Larger values are clamped to this ceiling.
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Query-string keys consumed by the sort/projection/pagination stages.
pub const RESERVED_QUERY_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Interval for purging stale rate limit windows
///
/// Background task runs at this interval to remove expired limiter entries.
pub const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Maximum accepted request body size (JSON and form bodies).
pub const BODY_LIMIT_BYTES: usize = 12 * 1024;

/// Ratings average assigned to a tour without reviews.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Minimum ratings average for a tour to appear in `/tour-stats`.
pub const TOUR_STATS_MIN_RATING: f64 = 4.5;

/// Mean earth radius used by the haversine distance, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Mean earth radius used by the haversine distance, in miles.
pub const EARTH_RADIUS_MI: f64 = 3963.2;
