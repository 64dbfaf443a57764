//! # Centralized Error Handling
//!
//! This module provides a unified error handling system for the application.
//! Every failure a handler can produce is an [`AppError`]. Errors are split in two tiers:
//!
//! - **operational** errors are expected and caller-facing (validation, not found,
//!   auth, conflicts). Their message is safe to show.
//! - **unclassified** errors are everything else (connection loss, hashing failures,
//!   panics). They are logged and never detailed to callers in production.
//!
//! [`AppError::classify`] performs the split and produces an [`ErrorReport`]. The report
//! rides on the response extensions until the responder middleware
//! ([`crate::middleware::render_errors`]) turns it into the final JSON or HTML body.

use std::sync::LazyLock;

use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde_json::json;
use sqlx::error::ErrorKind;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;
use tracing::{debug, error};

use crate::services::email::EmailError;
use crate::services::jwt::JwtError;
use crate::services::password::PasswordError;

/// Message returned for unclassified errors in production.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

/// Central application error type that encompasses all possible error conditions.
///
/// This enum provides a unified way to handle errors across the application,
/// with automatic conversion to appropriate HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("invalid {field}: {value}")]
    InvalidId { field: &'static str, value: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("too many requests")]
    TooManyRequests,

    /// An operational error with an explicit status, for the rare cases where an
    /// expected failure is not a 4xx (e.g. the reset email could not be delivered).
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    #[error("internal server error: {0}")]
    Internal(String),
}

/// Convenience Result type alias that uses AppError as the error type.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Classifies the error into the caller-facing shape.
    ///
    /// Structural database errors and token errors are recognised by their metadata
    /// and rewritten into operational errors; anything unrecognised stays unclassified.
    pub fn classify(&self) -> ErrorReport {
        let detail = format!("{self:?}");
        let (status, message, kind) = match self {
            AppError::Db(e) => match classify_db_error(e) {
                Some((status, message)) => (status, message, "database"),
                None => return ErrorReport::unclassified("database", detail),
            },
            AppError::Token(JwtError::TokenExpired) => (
                StatusCode::UNAUTHORIZED,
                "Your token has expired! Please log in again.".to_string(),
                "token_expired",
            ),
            AppError::Token(JwtError::InvalidToken) => (
                StatusCode::UNAUTHORIZED,
                "Invalid token! Please log in again.".to_string(),
                "invalid_token",
            ),
            AppError::Token(JwtError::EncodingError(_)) => {
                return ErrorReport::unclassified("token_encoding", detail);
            }
            AppError::Password(_) => return ErrorReport::unclassified("password_hash", detail),
            AppError::Email(_) => return ErrorReport::unclassified("email", detail),
            AppError::Internal(_) => return ErrorReport::unclassified("internal", detail),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                validation_message(errors),
                "validation",
            ),
            AppError::InvalidId { field, value } => (
                StatusCode::BAD_REQUEST,
                format!("Invalid {field}: {value}"),
                "cast",
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "bad_request"),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), "unauthorized"),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), "forbidden"),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), "not_found"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "conflict"),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests from this IP, please try again in an hour!".to_string(),
                "rate_limited",
            ),
            AppError::Operational { status, message } => (*status, message.clone(), "operational"),
        };

        ErrorReport {
            status,
            message,
            operational: true,
            kind,
            detail,
        }
    }
}

/// Caller-facing classification of an [`AppError`].
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    /// Human-readable message. For unclassified errors this is the internal description
    /// and must only be shown in development.
    pub message: String,
    pub operational: bool,
    /// Short machine-readable classification, e.g. `validation` or `token_expired`.
    pub kind: &'static str,
    /// Full debug representation of the source error.
    pub detail: String,
}

impl ErrorReport {
    fn unclassified(kind: &'static str, detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: detail.clone(),
            operational: false,
            kind,
            detail,
        }
    }

    /// Envelope status: `fail` for caller errors, `error` for server errors.
    pub fn status_label(&self) -> &'static str {
        if self.status.is_client_error() {
            "fail"
        } else {
            "error"
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = self.classify();
        debug!(
            status = %report.status,
            kind = report.kind,
            operational = report.operational,
            "Request failed"
        );

        // Production-safe body; the responder middleware replaces it when installed.
        let message = if report.operational {
            report.message.as_str()
        } else {
            GENERIC_ERROR_MESSAGE
        };
        let body = Json(json!({
            "status": report.status_label(),
            "message": message,
        }));

        let mut response = (report.status, body).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

static UNIQUE_DETAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Key \((?P<key>.+?)\)=\((?P<value>.*)\) already exists")
        .unwrap_or_else(|e| {
            error!("Failed to compile unique violation regex: {}", e);
            std::process::exit(1);
        })
});

fn classify_db_error(error: &sqlx::Error) -> Option<(StatusCode, String)> {
    match error {
        sqlx::Error::RowNotFound => Some((
            StatusCode::NOT_FOUND,
            "No document found with that ID".to_string(),
        )),
        sqlx::Error::Database(db) => {
            let constraint = db.constraint();
            match db.kind() {
                ErrorKind::UniqueViolation => {
                    let detail = db
                        .try_downcast_ref::<PgDatabaseError>()
                        .and_then(|pg| pg.detail());
                    Some((StatusCode::CONFLICT, duplicate_message(constraint, detail)))
                }
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => Some((
                    StatusCode::BAD_REQUEST,
                    format!("Invalid input data. {}", constraint_message(constraint)),
                )),
                ErrorKind::ForeignKeyViolation => Some((
                    StatusCode::BAD_REQUEST,
                    "Invalid input data. A referenced document does not exist".to_string(),
                )),
                _ if db.code().as_deref() == Some("22P02") => Some((
                    StatusCode::BAD_REQUEST,
                    "Invalid input data. Malformed value".to_string(),
                )),
                _ => None,
            }
        }
        _ => None,
    }
}

fn duplicate_message(constraint: Option<&str>, detail: Option<&str>) -> String {
    if constraint == Some("reviews_tour_user_key") {
        return "You have already written a review for this tour".to_string();
    }

    match detail.and_then(|d| UNIQUE_DETAIL_REGEX.captures(d)) {
        Some(captures) => format!(
            "Duplicate field value: \"{}\". Please use another value",
            &captures["value"]
        ),
        None => "Duplicate field value. Please use another value".to_string(),
    }
}

fn constraint_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("tours_price_discount_check") => "Discount price should be lower than the regular price",
        Some("tours_ratings_average_check") | Some("reviews_rating_check") => {
            "Rating must be between 1.0 and 5.0"
        }
        Some("tours_duration_check") => "A tour must have a positive duration",
        Some("tours_max_group_size_check") => "A tour must have a positive group size",
        Some("tours_price_check") | Some("bookings_price_check") => "Price must not be negative",
        Some("reviews_review_check") => "Review can not be empty",
        _ => "A field value violates a schema rule",
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value for {field}"),
            })
        })
        .collect();
    messages.sort();
    format!("Invalid input data. {}", messages.join(". "))
}
