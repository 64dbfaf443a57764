//! # Input Parsing Utilities
//!
//! Helpers for values that arrive as raw strings in paths and payloads:
//! document ids, tour slugs, geo coordinates and reset tokens.

use std::borrow::Cow;

use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::ValidationError;

use crate::error::{AppError, AppResult};

/// Parses a document id, failing with the caller-facing cast error.
///
/// # Examples
///
/// - `parse_uuid("id", "c3a1f3d2-...")` ✓ Valid
/// - `parse_uuid("id", "5c88fa8cf4afda39709c2951")` ✗ `Invalid id: 5c88...`
pub fn parse_uuid(field: &'static str, raw: &str) -> AppResult<Uuid> {
    Uuid::try_parse(raw).map_err(|_| AppError::InvalidId {
        field,
        value: raw.to_string(),
    })
}

/// Derives a URL slug: lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Parses `lat,lng` path segments.
pub fn parse_lat_lng(raw: &str) -> AppResult<(f64, f64)> {
    let invalid =
        || AppError::bad_request("Please provide latitude and longitude in the format lat,lng.");
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok((lat, lng))
}

/// SHA-256 hex digest, used to store password reset tokens.
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Rejects names made only of whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Value can not be blank")));
    }
    Ok(())
}
