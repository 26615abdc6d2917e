pub use sea_orm_migration::prelude::*;

mod m20260601_000001_create_order_status_log;
mod m20260601_000002_create_hanging_supplies;
mod m20260601_000003_create_final_supplies;
mod m20260602_000001_create_supply_operations;
mod m20260602_000002_create_order_status_snapshots;
mod m20260602_000003_create_onec_delivery_log;
mod m20260603_000001_create_sync_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260601_000001_create_order_status_log::Migration),
            Box::new(m20260601_000002_create_hanging_supplies::Migration),
            Box::new(m20260601_000003_create_final_supplies::Migration),
            Box::new(m20260602_000001_create_supply_operations::Migration),
            Box::new(m20260602_000002_create_order_status_snapshots::Migration),
            Box::new(m20260602_000003_create_onec_delivery_log::Migration),
            Box::new(m20260603_000001_create_sync_status::Migration),
        ]
    }
}
