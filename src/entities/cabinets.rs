use sea_orm::entity::prelude::*;

/// A podiatry practice. One is seeded per registration; the setup wizard
/// owns everything else about it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cabinets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_user_id: i32,

    pub name: String,

    pub is_active: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
