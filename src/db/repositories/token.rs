use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use sha2::{Digest, Sha256};

use super::user;
use crate::entities::{email_verification_tokens, users};

/// A token row to persist; only ever carries the hash.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: i32,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub request_ip: Option<Vec<u8>>,
    pub user_agent: Option<String>,
}

/// Identity attached to a successfully consumed token.
#[derive(Debug, Clone)]
pub struct VerifiedAccount {
    pub user_id: i32,
    pub email_normalized: String,
}

/// Insert on any connection so registration can issue its first token
/// inside the registration transaction.
pub(crate) async fn insert_on<C: ConnectionTrait>(
    conn: &C,
    token: NewToken,
) -> Result<(), sea_orm::DbErr> {
    let row = email_verification_tokens::ActiveModel {
        user_id: Set(token.user_id),
        token_hash: Set(token.token_hash),
        expires_at: Set(token.expires_at),
        used_at: Set(None),
        request_ip: Set(token.request_ip),
        user_agent: Set(token.user_agent),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    row.insert(conn).await?;
    Ok(())
}

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Persist a freshly issued token hash (resend path; registration
    /// issues its token inside its own transaction).
    pub async fn issue(&self, token: NewToken) -> Result<()> {
        insert_on(&self.conn, token)
            .await
            .context("Failed to insert verification token")
    }

    /// Consume a token by hash: claim it with a single conditional UPDATE
    /// (`used_at IS NULL AND expires_at > now`), then mark the owning user
    /// verified, all in one transaction. Under concurrent attempts with
    /// the same raw token the claim succeeds for exactly one caller; the
    /// rest see no matching row and get `None` without side effects.
    pub async fn consume(&self, token_hash: &str) -> Result<Option<VerifiedAccount>> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open token consumption transaction")?;
        let now = Utc::now();

        let claimed = email_verification_tokens::Entity::update_many()
            .col_expr(
                email_verification_tokens::Column::UsedAt,
                Expr::value(Some(now)),
            )
            .filter(email_verification_tokens::Column::TokenHash.eq(token_hash))
            .filter(email_verification_tokens::Column::UsedAt.is_null())
            .filter(email_verification_tokens::Column::ExpiresAt.gt(now))
            .exec(&txn)
            .await
            .context("Failed to claim verification token")?;

        if claimed.rows_affected == 0 {
            txn.rollback()
                .await
                .context("Failed to roll back token consumption")?;
            return Ok(None);
        }

        let row = email_verification_tokens::Entity::find()
            .filter(email_verification_tokens::Column::TokenHash.eq(token_hash))
            .one(&txn)
            .await
            .context("Failed to read claimed token")?
            .ok_or_else(|| anyhow::anyhow!("Claimed token row not found"))?;

        user::mark_email_verified_on(&txn, row.user_id)
            .await
            .context("Failed to mark email verified")?;

        let owner = users::Entity::find_by_id(row.user_id)
            .one(&txn)
            .await
            .context("Failed to read token owner")?
            .ok_or_else(|| anyhow::anyhow!("Token owner not found"))?;

        txn.commit()
            .await
            .context("Failed to commit token consumption")?;

        Ok(Some(VerifiedAccount {
            user_id: owner.id,
            email_normalized: owner.email_normalized,
        }))
    }
}

/// Generate a raw verification token: 32 random bytes, hex-encoded to
/// 64 chars. The raw value is delivered once and never stored.
#[must_use]
pub fn generate_raw_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Hex-encoded SHA-256 of the raw token; this is what gets persisted.
#[must_use]
pub fn hash_token(raw_token: &str) -> String {
    let digest = Sha256::digest(raw_token.as_bytes());

    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tokens_are_64_hex_chars() {
        let raw = generate_raw_token();
        assert_eq!(raw.len(), 64);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn raw_tokens_do_not_repeat() {
        assert_ne!(generate_raw_token(), generate_raw_token());
    }

    #[test]
    fn token_hash_is_stable_and_distinct_from_raw() {
        let raw = generate_raw_token();
        let hash = hash_token(&raw);

        assert_eq!(hash.len(), 64);
        assert_ne!(hash, raw);
        assert_eq!(hash, hash_token(&raw));
    }

    #[test]
    fn token_hash_matches_known_digest() {
        // sha256("abc"), the FIPS 180-2 example vector
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
