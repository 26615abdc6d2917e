pub mod empty_supply_cleanup;
pub mod hanging_supplies_sync;
pub mod order_snapshot_sync;
