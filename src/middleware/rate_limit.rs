//! Fixed-window request limit per client IP.
//!
//! Windows live in a [`DashMap`] keyed by IP. A background task started by
//! [`crate::app_with_email_service`] calls [`RateLimiter::cleanup_expired_entries`]
//! periodically so the map does not grow without bound.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::config::RateLimitConfig;
use crate::error::{AppError, AppResult};
use crate::models::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Counts one request from `ip`. Returns `false` once the window is exhausted.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.config.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.config.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drops windows that have fully elapsed.
    #[instrument(skip_all)]
    pub fn cleanup_expired_entries(&self) {
        let initial_size = self.windows.len();
        let window = self.config.window;
        self.windows
            .retain(|_, w| w.started.elapsed() < window);
        let final_size = self.windows.len();

        if initial_size != final_size {
            info!(
                initial_size,
                final_size,
                removed = initial_size - final_size,
                "Cleaned up expired rate limit entries"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Applies the limiter to the connecting IP. Requests without connection
/// info are passed through.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match ip {
        Some(ip) if !state.rate_limiter.check(ip) => {
            warn!(%ip, "Rate limit exceeded");
            Err(AppError::TooManyRequests)
        }
        Some(_) => Ok(next.run(req).await),
        None => {
            debug!("No connection info, skipping rate limit");
            Ok(next.run(req).await)
        }
    }
}
