pub use super::final_supplies::Entity as FinalSupplies;
pub use super::hanging_supplies::Entity as HangingSupplies;
pub use super::onec_delivery_log::Entity as OnecDeliveryLog;
pub use super::order_status_log::Entity as OrderStatusLog;
pub use super::order_status_snapshots::Entity as OrderStatusSnapshots;
pub use super::supply_operations::Entity as SupplyOperations;
pub use super::sync_status::Entity as SyncStatus;
