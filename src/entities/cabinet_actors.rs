use sea_orm::entity::prelude::*;

/// Practice staff. Registration seeds the owning "titulaire"; the wizard
/// manages the rest.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cabinet_actors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub cabinet_id: i32,

    /// "titulaire", "collaborateur", ...
    pub kind: String,

    pub display_name: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub email: Option<String>,

    pub is_active: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
