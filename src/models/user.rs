//! Account records.
//!
//! [`User`] is the typed row used by the auth chain and account handlers. Reads
//! served to API callers go through the [`USERS`] collection instead.

use serde::Serialize;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use super::Role;
use crate::utils::query::{Collection, Field, FieldKind};

/// API view of the `users` table. Inactive accounts are invisible.
pub static USERS: Collection = Collection {
    name: "users",
    source: "users u",
    base_condition: "u.active",
    id_expr: "u.id",
    default_sort: "createdAt",
    fields: &[
        Field::new("id", "u.id", FieldKind::Uuid),
        Field::new("name", "u.name", FieldKind::Text),
        Field::new("email", "u.email", FieldKind::Text),
        Field::new("photo", "u.photo", FieldKind::Text),
        Field::new("role", "u.role", FieldKind::Enum),
        Field::new("createdAt", "u.created_at", FieldKind::Timestamp).hidden(),
        Field::new("version", "u.version", FieldKind::Int).hidden(),
    ],
};

const USER_COLUMNS: &str = "id, name, email, photo, role, password_hash, password_changed_at, \
     password_reset_token, password_reset_expires, active, created_at";

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(skip)]
    pub password_reset_token: Option<String>,
    #[serde(skip)]
    pub password_reset_expires: Option<OffsetDateTime>,
    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Whether the password changed after a token issued at `iat` (unix seconds).
    pub fn changed_password_after(&self, iat: u64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => {
                i128::from(iat) * 1_000_000_000 < changed_at.unix_timestamp_nanos()
            }
            None => false,
        }
    }

    pub async fn find_active_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_active_by_email<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await
    }

    /// Looks up the account holding an unexpired reset token digest.
    pub async fn find_by_reset_token<'e, E: PgExecutor<'e>>(
        executor: E,
        token_digest: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE password_reset_token = $1 AND password_reset_expires > now() AND active"
        ))
        .bind(token_digest)
        .fetch_optional(executor)
        .await
    }

    /// Inserts a new account with the default role and photo.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name.trim())
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .fetch_one(executor)
        .await
    }

    /// Stores (or clears, with `None`) the reset token digest and its expiry.
    pub async fn set_reset_token<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        token: Option<(&str, OffsetDateTime)>,
    ) -> Result<(), sqlx::Error> {
        let (digest, expires) = token.unzip();
        sqlx::query(
            "UPDATE users SET password_reset_token = $1, password_reset_expires = $2 WHERE id = $3",
        )
        .bind(digest)
        .bind(expires)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Stores a new password hash and clears any pending reset token.
    ///
    /// The change time is backdated by one second so a token issued right
    /// after the change still counts as fresh.
    pub async fn set_password<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET password_hash = $1, \
             password_changed_at = now() - interval '1 second', \
             password_reset_token = NULL, password_reset_expires = NULL, \
             version = version + 1 \
             WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Marks the account inactive. Returns whether an active account was found.
    pub async fn deactivate<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET active = FALSE, version = version + 1 WHERE id = $1 AND active",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn user(changed: Option<OffsetDateTime>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Leo J. Gillespie".into(),
            email: "leo@example.io".into(),
            photo: "default.jpg".into(),
            role: Role::User,
            password_hash: String::new(),
            password_changed_at: changed,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[test]
    fn first_name_is_first_word() {
        assert_eq!(user(None).first_name(), "Leo");
    }

    #[test]
    fn token_issued_before_change_is_stale() {
        let changed = datetime!(2024-05-01 12:00:00 UTC);
        let u = user(Some(changed));
        let iat = changed.unix_timestamp() as u64;
        assert!(u.changed_password_after(iat - 1));
        assert!(!u.changed_password_after(iat));
        assert!(!u.changed_password_after(iat + 60));
    }

    #[test]
    fn never_changed_password_is_fresh() {
        assert!(!user(None).changed_password_after(0));
    }

    #[test]
    fn sensitive_fields_are_not_serialized() {
        let value = serde_json::to_value(user(None)).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("active").is_none());
        assert_eq!(value["role"], "user");
    }
}
