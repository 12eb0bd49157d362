use sea_orm::entity::prelude::*;

/// Single-use email-verification tokens. Only the SHA-256 digest of the
/// raw token is stored; the raw value leaves the process exactly once.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "email_verification_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    /// Hex-encoded SHA-256 of the raw token (64 chars)
    #[sea_orm(unique)]
    pub token_hash: String,

    pub expires_at: DateTimeUtc,

    /// Set exactly once on consumption; NULL means still consumable
    pub used_at: Option<DateTimeUtc>,

    /// Binary client IP of the issuing request (4 or 16 bytes)
    pub request_ip: Option<Vec<u8>>,

    pub user_agent: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
