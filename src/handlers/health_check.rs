//! Liveness probe for load balancers and deploy tooling.

use axum::http::StatusCode;
use tracing::{debug, instrument};

/// Answers `200 OK` with an empty body. Touches neither the database nor the
/// mail service, so it only tells that the process is serving requests.
#[instrument]
pub async fn health_check() -> StatusCode {
    debug!("Liveness probe");
    StatusCode::OK
}
