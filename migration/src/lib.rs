pub use sea_orm_migration::prelude::*;

mod m20261001_000001_initial;
mod m20261001_000002_add_payment_transactions;
mod m20261001_000003_add_user_memberships;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_initial::Migration),
            Box::new(m20261001_000002_add_payment_transactions::Migration),
            Box::new(m20261001_000003_add_user_memberships::Migration),
        ]
    }
}
