use sea_orm::entity::prelude::*;

/// Server-side session rows. The client only ever holds the opaque key;
/// a fresh key is issued on every successful login.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Random 64-char hex key held by the client
    #[sea_orm(unique)]
    pub session_key: String,

    pub user_id: i32,

    pub email: String,

    pub role: String,

    /// Wizard-owned slot; opaque to the auth core
    pub active_cabinet_id: Option<i32>,

    pub created_at: DateTimeUtc,

    /// Sliding expiry, refreshed on lookup
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
