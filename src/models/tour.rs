//! Tour records, the [`TOURS`] collection and the row types of the tour
//! aggregation endpoints and pages.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::utils::query::{Collection, Field, FieldKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tour_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

/// A GeoJSON point with a description. `coordinates` is `[lng, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default = "point")]
    pub kind: String,
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

fn point() -> String {
    "Point".to_string()
}

/// Latitude and longitude of a tour's start location, as SQL expressions.
pub const START_LAT_EXPR: &str = "(t.start_location->'coordinates'->>1)::float8";
pub const START_LNG_EXPR: &str = "(t.start_location->'coordinates'->>0)::float8";

/// API view of the `tours` table. Secret tours are invisible.
pub static TOURS: Collection = Collection {
    name: "tours",
    source: "tours t",
    base_condition: "NOT t.secret",
    id_expr: "t.id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "t.id", FieldKind::Uuid),
        Field::new("name", "t.name", FieldKind::Text),
        Field::new("slug", "t.slug", FieldKind::Text),
        Field::new("duration", "t.duration", FieldKind::Int).multi(),
        Field::new("maxGroupSize", "t.max_group_size", FieldKind::Int).multi(),
        Field::new("difficulty", "t.difficulty", FieldKind::Enum).multi(),
        Field::new("ratingsAverage", "t.ratings_average", FieldKind::Float).multi(),
        Field::new("ratingsQuantity", "t.ratings_quantity", FieldKind::Int).multi(),
        Field::new("price", "t.price", FieldKind::Float).multi(),
        Field::new("priceDiscount", "t.price_discount", FieldKind::Float),
        Field::new("summary", "t.summary", FieldKind::Text),
        Field::new("description", "t.description", FieldKind::Text),
        Field::new("imageCover", "t.image_cover", FieldKind::Text),
        Field::new("images", "t.images", FieldKind::Opaque),
        Field::new("startDates", "t.start_dates", FieldKind::Opaque),
        Field::new("secretTour", "t.secret", FieldKind::Bool),
        Field::new("startLocation", "t.start_location", FieldKind::Opaque),
        Field::new("locations", "t.locations", FieldKind::Opaque),
        Field::new(
            "guides",
            "(SELECT coalesce(jsonb_agg(jsonb_build_object(\
             'id', u.id, 'name', u.name, 'email', u.email, 'photo', u.photo, 'role', u.role) \
             ORDER BY g.position), '[]'::jsonb) \
             FROM tour_guides g JOIN users u ON u.id = g.user_id \
             WHERE g.tour_id = t.id AND u.active)",
            FieldKind::Opaque,
        ),
        Field::new("durationWeeks", "t.duration / 7.0", FieldKind::Float).computed(),
        Field::new("createdAt", "t.created_at", FieldKind::Timestamp).hidden(),
        Field::new("version", "t.version", FieldKind::Int).hidden(),
    ],
};

/// Per-difficulty statistics of highly rated tours.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts within one month of a year.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// Data shown on an overview card.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TourCard {
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub summary: String,
    pub image_cover: String,
    pub start_location: Option<Json<Location>>,
    pub first_start: Option<OffsetDateTime>,
    pub stops: i32,
}

pub const TOUR_CARD_COLUMNS: &str = "t.name, t.slug, t.duration, t.max_group_size, t.difficulty, \
     t.ratings_average, t.ratings_quantity, t.price, t.summary, t.image_cover, t.start_location, \
     t.start_dates[1] AS first_start, coalesce(jsonb_array_length(t.locations), 0) AS stops";

#[derive(Debug, Clone, Deserialize)]
pub struct GuideSummary {
    pub name: String,
    pub photo: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSummary {
    pub review: String,
    pub rating: f64,
    pub name: String,
    pub photo: String,
}

/// Everything the tour detail page renders.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TourPage {
    #[sqlx(flatten)]
    pub card: TourCard,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub locations: Json<Vec<Location>>,
    pub guides: Json<Vec<GuideSummary>>,
    pub reviews: Json<Vec<ReviewSummary>>,
}
