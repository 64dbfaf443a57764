use crate::utils::query::{Collection, Field, FieldKind};

/// API view of the `bookings` table with tour and account populated. A
/// deactivated account populates as `null`.
pub static BOOKINGS: Collection = Collection {
    name: "bookings",
    source: "bookings b",
    base_condition: "TRUE",
    id_expr: "b.id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "b.id", FieldKind::Uuid),
        Field::new(
            "tour",
            "(SELECT jsonb_build_object('id', t.id, 'name', t.name) FROM tours t WHERE t.id = b.tour_id)",
            FieldKind::Opaque,
        ),
        Field::new(
            "user",
            "(SELECT jsonb_build_object('id', u.id, 'name', u.name, 'email', u.email) \
             FROM users u WHERE u.id = b.user_id AND u.active)",
            FieldKind::Opaque,
        ),
        Field::new("price", "b.price", FieldKind::Float),
        Field::new("paid", "b.paid", FieldKind::Bool),
        Field::new("createdAt", "b.created_at", FieldKind::Timestamp),
        Field::new("version", "b.version", FieldKind::Int).hidden(),
    ],
};
