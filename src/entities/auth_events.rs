use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Append-only security audit trail. Rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "auth_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// NULL for events about unknown identities (e.g. unknown-email login)
    pub user_id: Option<i32>,

    pub event_type: String,

    pub email_normalized: Option<String>,

    pub success: bool,

    /// Binary client IP (4 or 16 bytes)
    pub request_ip: Option<Vec<u8>>,

    /// Truncated to 255 chars at capture time
    pub user_agent: Option<String>,

    /// JSON object with branch-specific context (reason codes etc.)
    pub details: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
