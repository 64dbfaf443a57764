//! # Shared Resource Operations
//!
//! Generic list/read/delete operations over a [`Collection`], plus the response
//! envelopes every resource controller uses.

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::RequestTime;
use crate::utils::query::{Collection, QueryFeatures, QueryParams};

pub const NO_DOCUMENT_MESSAGE: &str = "No document found with that ID";

/// `{status:"success", data:{data: doc}}`
pub fn single<T: Serialize>(doc: T) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "data": doc },
    }))
}

/// `{status:"success", requestedAt, results, data:{data:[...]}}`
pub fn list(docs: Vec<Value>, requested_at: RequestTime) -> Json<Value> {
    let requested_at = requested_at.0.format(&Rfc3339).unwrap_or_default();
    Json(json!({
        "status": "success",
        "requestedAt": requested_at,
        "results": docs.len(),
        "data": { "data": docs },
    }))
}

/// Runs the full shaping pipeline over `base`.
#[instrument(skip(pool, base), fields(collection = base.collection_name()))]
pub async fn get_all(pool: &PgPool, base: QueryFeatures, params: &QueryParams) -> AppResult<Vec<Value>> {
    let features = base
        .filter(params)?
        .sort(params)?
        .limit_fields(params)?
        .paginate(params);

    let docs = features.fetch_all(pool).await?;
    debug!(results = docs.len(), "Shaped read completed");
    Ok(docs)
}

/// Reads one document in the collection's default projection.
pub async fn get_one(pool: &PgPool, collection: &'static Collection, id: Uuid) -> AppResult<Value> {
    QueryFeatures::new(collection)
        .fetch_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_DOCUMENT_MESSAGE))
}

/// Hard-deletes one row of `table`.
///
/// `table` must be a static table name, never caller input.
#[instrument(skip(pool))]
pub async fn delete_one(pool: &PgPool, table: &'static str, id: Uuid) -> AppResult<()> {
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(NO_DOCUMENT_MESSAGE));
    }
    Ok(())
}
