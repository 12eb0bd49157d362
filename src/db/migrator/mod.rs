use sea_orm_migration::prelude::*;

mod m20260612_create_auth_tables;
mod m20260710_create_cabinet_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260612_create_auth_tables::Migration),
            Box::new(m20260710_create_cabinet_tables::Migration),
        ]
    }
}
