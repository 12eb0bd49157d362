use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Display form, as typed at registration
    pub email: String,

    /// Lowercased + trimmed; the lookup key for every flow
    #[sea_orm(unique)]
    pub email_normalized: String,

    pub email_verified: bool,

    /// Self-describing modular-crypt hash (argon2id/argon2i/bcrypt)
    pub password_hash: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub role: String,

    /// "active" unless the account has been administratively disabled
    pub status: String,

    pub failed_login_count: i32,

    /// Login is refused while this is in the future, password or not
    pub locked_until: Option<DateTimeUtc>,

    pub last_login_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
