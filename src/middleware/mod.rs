//! # Middleware Components
//!
//! This module contains middleware functions that handle cross-cutting concerns
//! such as authentication, authorization, rate limiting and error rendering.

pub mod auth;
pub mod rate_limit;
pub mod request_time;
pub mod responder;

pub use auth::{AllowedRoles, CurrentUser, Viewer, is_logged_in, protect, restrict_to};
pub use rate_limit::{RateLimiter, rate_limit};
pub use request_time::{RequestTime, stamp_request_time};
pub use responder::{handle_panic, render_errors};
