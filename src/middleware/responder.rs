//! # Central Error Responder
//!
//! Outermost middleware. Failed handlers and middleware leave an [`ErrorReport`]
//! in the response extensions; [`render_errors`] replaces the body with the
//! final JSON (API routes) or HTML page (everything else), detailed in
//! development and sanitized in production.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::error;

use crate::config::Environment;
use crate::error::{AppError, ErrorReport, GENERIC_ERROR_MESSAGE};
use crate::utils::html::render_error_page;

/// Which surface a failed request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Api,
    Page,
}

impl RequestKind {
    pub fn from_path(path: &str) -> Self {
        if path.starts_with("/api") {
            RequestKind::Api
        } else {
            RequestKind::Page
        }
    }
}

pub async fn render_errors(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let kind = RequestKind::from_path(req.uri().path());
    let response = next.run(req).await;

    match response.extensions().get::<ErrorReport>().cloned() {
        Some(report) => respond(&report, environment, kind),
        None => response,
    }
}

/// Builds the final error response.
pub fn respond(report: &ErrorReport, environment: Environment, kind: RequestKind) -> Response {
    if !report.operational {
        error!(kind = report.kind, detail = %report.detail, "Unhandled error");
    }

    match (kind, environment) {
        (RequestKind::Api, Environment::Development) => {
            (report.status, Json(development_body(report))).into_response()
        }
        (RequestKind::Api, Environment::Production) => {
            if report.operational {
                let body = json!({
                    "status": report.status_label(),
                    "message": report.message,
                });
                (report.status, Json(body)).into_response()
            } else {
                let body = json!({
                    "status": "error",
                    "message": GENERIC_ERROR_MESSAGE,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
        (RequestKind::Page, Environment::Development) => {
            (report.status, Html(render_error_page(&report.message))).into_response()
        }
        (RequestKind::Page, Environment::Production) => {
            let message = if report.operational {
                report.message.as_str()
            } else {
                "Please try again later."
            };
            (report.status, Html(render_error_page(message))).into_response()
        }
    }
}

fn development_body(report: &ErrorReport) -> Value {
    json!({
        "status": report.status_label(),
        "error": {
            "kind": report.kind,
            "statusCode": report.status.as_u16(),
            "operational": report.operational,
        },
        "message": report.message,
        "stack": report.detail,
    })
}

/// Converts a caught handler panic into an unclassified error response.
pub fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}
