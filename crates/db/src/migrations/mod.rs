//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250110_000001_create_notification_table;
mod m20250110_000002_create_user_link_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_notification_table::Migration),
            Box::new(m20250110_000002_create_user_link_tables::Migration),
        ]
    }
}
