//! # Tour Rating Aggregate
//!
//! Every review write calls [`recalculate_tour_rating`] inside the same
//! transaction as the write. The tour row is locked first, so concurrent
//! reviews of one tour recompute the aggregate one after another and each
//! recomputation sees the previously committed reviews.

use serde::Serialize;
use sqlx::PgConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::utils::constant::DEFAULT_RATINGS_AVERAGE;

/// Count and mean of a tour's reviews, as stored on the tour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourRating {
    pub ratings_quantity: i32,
    pub ratings_average: f64,
}

impl TourRating {
    /// Builds the stored aggregate from raw review statistics.
    ///
    /// The mean is rounded to one decimal. A tour without reviews falls back
    /// to the default average.
    pub fn from_stats(count: i64, average: Option<f64>) -> Self {
        match average {
            Some(avg) if count > 0 => Self {
                ratings_quantity: i32::try_from(count).unwrap_or(i32::MAX),
                ratings_average: (avg * 10.0).round() / 10.0,
            },
            _ => Self {
                ratings_quantity: 0,
                ratings_average: DEFAULT_RATINGS_AVERAGE,
            },
        }
    }
}

/// Recomputes and stores the rating aggregate of `tour_id`.
///
/// Returns `Ok(None)` when the tour no longer exists.
#[instrument(skip(conn))]
pub async fn recalculate_tour_rating(
    conn: &mut PgConnection,
    tour_id: Uuid,
) -> Result<Option<TourRating>, sqlx::Error> {
    let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM tours WHERE id = $1 FOR UPDATE")
        .bind(tour_id)
        .fetch_optional(&mut *conn)
        .await?;
    if locked.is_none() {
        debug!("Tour vanished before rating recalculation");
        return Ok(None);
    }

    let (count, average): (i64, Option<f64>) =
        sqlx::query_as("SELECT count(*), avg(rating)::float8 FROM reviews WHERE tour_id = $1")
            .bind(tour_id)
            .fetch_one(&mut *conn)
            .await?;

    let rating = TourRating::from_stats(count, average);

    sqlx::query("UPDATE tours SET ratings_quantity = $1, ratings_average = $2 WHERE id = $3")
        .bind(rating.ratings_quantity)
        .bind(rating.ratings_average)
        .bind(tour_id)
        .execute(&mut *conn)
        .await?;

    debug!(
        ratings_quantity = rating.ratings_quantity,
        ratings_average = rating.ratings_average,
        "Tour rating recalculated"
    );
    Ok(Some(rating))
}
