use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::sessions;

/// A live session as seen by callers; `key` is the opaque client token.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub key: String,
    pub user_id: i32,
    pub email: String,
    pub role: String,
    pub active_cabinet_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<sessions::Model> for SessionRecord {
    fn from(model: sessions::Model) -> Self {
        Self {
            key: model.session_key,
            user_id: model.user_id,
            email: model.email,
            role: model.role,
            active_cabinet_id: model.active_cabinet_id,
            created_at: model.created_at,
            expires_at: model.expires_at,
        }
    }
}

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a fresh session row under a newly generated key.
    pub async fn create(
        &self,
        user_id: i32,
        email: &str,
        role: &str,
        ttl_minutes: i64,
    ) -> Result<SessionRecord> {
        let now = Utc::now();
        let row = sessions::ActiveModel {
            session_key: Set(generate_session_key()),
            user_id: Set(user_id),
            email: Set(email.to_string()),
            role: Set(role.to_string()),
            active_cabinet_id: Set(None),
            created_at: Set(now),
            expires_at: Set(now + Duration::minutes(ttl_minutes)),
            ..Default::default()
        };

        let model = row
            .insert(&self.conn)
            .await
            .context("Failed to insert session")?;

        Ok(SessionRecord::from(model))
    }

    /// Remove a session row. Removing an unknown key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        sessions::Entity::delete_many()
            .filter(sessions::Column::SessionKey.eq(key))
            .exec(&self.conn)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Resolve a key to its session, treating expired rows as absent
    /// (they are deleted on sight) and refreshing the sliding expiry on
    /// a hit.
    pub async fn find_live(&self, key: &str, ttl_minutes: i64) -> Result<Option<SessionRecord>> {
        let now = Utc::now();

        let row = sessions::Entity::find()
            .filter(sessions::Column::SessionKey.eq(key))
            .one(&self.conn)
            .await
            .context("Failed to query session")?;

        let Some(row) = row else {
            return Ok(None);
        };

        if row.expires_at <= now {
            self.delete(key).await?;
            return Ok(None);
        }

        let refreshed = now + Duration::minutes(ttl_minutes);
        sessions::Entity::update_many()
            .col_expr(sessions::Column::ExpiresAt, Expr::value(refreshed))
            .filter(sessions::Column::SessionKey.eq(key))
            .exec(&self.conn)
            .await
            .context("Failed to refresh session expiry")?;

        let mut record = SessionRecord::from(row);
        record.expires_at = refreshed;
        Ok(Some(record))
    }

    /// Write the wizard's active-cabinet slot.
    pub async fn set_active_cabinet(&self, key: &str, cabinet_id: Option<i32>) -> Result<()> {
        sessions::Entity::update_many()
            .col_expr(sessions::Column::ActiveCabinetId, Expr::value(cabinet_id))
            .filter(sessions::Column::SessionKey.eq(key))
            .exec(&self.conn)
            .await
            .context("Failed to set active cabinet")?;

        Ok(())
    }
}

/// Generate an opaque session key (64 character hex string).
#[must_use]
pub fn generate_session_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_are_64_hex_chars() {
        let key = generate_session_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_keys_do_not_repeat() {
        assert_ne!(generate_session_key(), generate_session_key());
    }
}
