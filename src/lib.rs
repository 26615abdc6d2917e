// src/lib.rs

use sea_orm::DatabaseConnection;
use services::supply_lifecycle::SupplyLifecycleService;
use services::wb_client::WbApiService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub wb: WbApiService,
    pub lifecycle: SupplyLifecycleService,
}

pub mod entities {
    pub mod prelude;
    pub mod final_supplies;
    pub mod hanging_supplies;
    pub mod onec_delivery_log;
    pub mod order_status_log;
    pub mod order_status_snapshots;
    pub mod supply_operations;
    pub mod sync_status;
}

pub mod services {
    pub mod article_codes;
    pub mod final_store;
    pub mod hanging_store;
    pub mod onec_integration;
    pub mod operations_store;
    pub mod shipment_log;
    pub mod snapshot_store;
    pub mod status_ledger;
    pub mod status_validation;
    pub mod supply_lifecycle;
    pub mod supply_selection;
    pub mod sync_status;
    pub mod wb_client;
}

pub mod models {
    pub mod order_status;
    pub mod orders;
    pub mod supplies;
}

pub mod handlers {
    pub mod operations;
    pub mod supplies;
}

pub mod jobs;
