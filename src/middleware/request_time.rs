use axum::{extract::Request, middleware::Next, response::Response};
use time::OffsetDateTime;

/// Time the request entered the application. Reported as `requestedAt` by list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RequestTime(pub OffsetDateTime);

pub async fn stamp_request_time(mut req: Request, next: Next) -> Response {
    req.extensions_mut()
        .insert(RequestTime(OffsetDateTime::now_utc()));
    next.run(req).await
}
