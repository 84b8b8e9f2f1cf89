pub use sea_orm_migration::prelude::*;

mod m20250101_000000_create_users;
mod m20250101_000001_create_personal_access_tokens;
mod m20250101_000002_create_user_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000000_create_users::Migration),
            Box::new(m20250101_000001_create_personal_access_tokens::Migration),
            Box::new(m20250101_000002_create_user_audit_logs::Migration),
        ]
    }
}
