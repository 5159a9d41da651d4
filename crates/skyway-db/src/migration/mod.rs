//! database migrations for skyway.

pub use sea_orm_migration::prelude::*;

mod m20260701_000001_create_credentials;
mod m20260701_000002_create_backbones;
mod m20260701_000003_create_vans;
mod m20260701_000004_create_applications;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260701_000001_create_credentials::Migration),
            Box::new(m20260701_000002_create_backbones::Migration),
            Box::new(m20260701_000003_create_vans::Migration),
            Box::new(m20260701_000004_create_applications::Migration),
        ]
    }
}
