pub use sea_orm_migration::prelude::*;

mod seed_helpers;

mod m20250101_000001_create_identity_tables;
mod m20250101_000002_create_grid_tables;
mod m20250101_000003_seed_roles_and_admin;
mod m20250101_000004_create_sample_grids;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_identity_tables::Migration),
            Box::new(m20250101_000002_create_grid_tables::Migration),
            Box::new(m20250101_000003_seed_roles_and_admin::Migration),
            Box::new(m20250101_000004_create_sample_grids::Migration),
        ]
    }
}
