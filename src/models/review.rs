use crate::utils::query::{Collection, Field, FieldKind};

/// API view of the `reviews` table with the author populated. A deactivated
/// author populates as `null`.
pub static REVIEWS: Collection = Collection {
    name: "reviews",
    source: "reviews r",
    base_condition: "TRUE",
    id_expr: "r.id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "r.id", FieldKind::Uuid),
        Field::new("review", "r.review", FieldKind::Text),
        Field::new("rating", "r.rating", FieldKind::Float),
        Field::new("createdAt", "r.created_at", FieldKind::Timestamp),
        Field::new("version", "r.version", FieldKind::Int).hidden(),
        Field::new("tour", "r.tour_id", FieldKind::Uuid),
        Field::new(
            "user",
            "(SELECT jsonb_build_object('id', u.id, 'name', u.name, 'photo', u.photo) \
             FROM users u WHERE u.id = r.user_id AND u.active)",
            FieldKind::Opaque,
        ),
    ],
};
