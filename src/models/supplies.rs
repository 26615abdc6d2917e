//! Request/response types for the supply lifecycle endpoints

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One source supply inside a move request: which orders of which supply are
/// candidates for this wild
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplySelector {
    pub account: String,
    pub supply_id: String,
    pub order_ids: Vec<i64>,
}

/// Per-wild movement group: candidate supplies plus how many orders to pull out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WildMoveGroup {
    pub supplies: Vec<SupplySelector>,
    pub remove_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveOrdersRequest {
    /// Idempotency key; a repeated request with a completed operation id
    /// returns the persisted result without touching the marketplace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// wild code -> movement group
    pub orders: HashMap<String, WildMoveGroup>,
    /// true = final supply destination (FIFO), false = hanging (newest-first)
    pub move_to_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveOrdersResponse {
    pub success: bool,
    /// Orders confirmed out of their source supplies (moved, plus
    /// blocked-but-shipped in final mode after a successful 1C send)
    pub removed_order_ids: Vec<i64>,
    pub processed_supplies: usize,
    pub processed_wilds: usize,
    pub total_orders: usize,
    pub successful_count: usize,
    pub invalid_status_count: usize,
    pub blocked_but_shipped_count: usize,
    pub failed_movement_count: usize,
    pub total_failed_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverFictitiousRequest {
    /// supply_id -> account
    pub supplies: HashMap<String, String>,
    pub operator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FictitiousDeliveryOutcome {
    pub supply_id: String,
    pub account: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub orders_logged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverFictitiousResponse {
    pub success: bool,
    pub total_processed: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub results: Vec<FictitiousDeliveryOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipFictitiousRequest {
    /// supply_id -> account
    pub supplies: HashMap<String, String>,
    pub shipped_quantity: usize,
    pub operator: String,
}

/// Sticker for one fictitiously shipped order (base64 PNG payload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippedOrderSticker {
    pub order_id: i64,
    pub supply_id: String,
    pub account: String,
    pub wild: String,
    pub file: String,
    pub part_a: i64,
    pub part_b: i64,
    pub barcode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipFictitiousResponse {
    pub success: bool,
    pub requested_quantity: usize,
    pub shipped_count: usize,
    /// true when fewer eligible orders were available than requested
    pub clamped: bool,
    pub stickers: Vec<ShippedOrderSticker>,
}

/// Brief order view inside supply listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyOrderBrief {
    pub order_id: i64,
    pub nm_id: i64,
    pub local_vendor_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyListEntry {
    pub name: String,
    pub created_at: String,
    pub supply_id: String,
    pub account: String,
    pub count: usize,
    pub orders: Vec<SupplyOrderBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyListResponse {
    pub supplies: Vec<SupplyListEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyDeleteItem {
    pub account: String,
    pub supply_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyDeleteRequest {
    pub supply: Vec<SupplyDeleteItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyDeleteResponse {
    pub deleted: Vec<SupplyDeleteItem>,
}

/// One supply with the concrete orders being dispatched; consumed by the
/// ERP adapter and the shipment-log client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyShipmentInfo {
    pub supply_id: String,
    pub account: String,
    pub order_ids: Vec<i64>,
}

/// Request to dispatch assembled supplies for real (done=true on WB)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverSuppliesRequest {
    pub supplies: Vec<SupplyShipmentInfo>,
    /// order_id -> wild code
    pub order_wild_map: HashMap<i64, String>,
    pub operator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverSuppliesResponse {
    pub success: bool,
    pub delivered_supplies: usize,
    pub logged_orders: usize,
}

/// Hanging supply as the listing endpoints expose it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangingSupplyView {
    pub supply_id: String,
    pub account: String,
    pub order_count: usize,
    pub shipped_count: usize,
    pub is_fictitious_delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fictitious_delivered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fictitious_delivery_operator: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangingSupplyListResponse {
    pub supplies: Vec<HangingSupplyView>,
}

/// Stored operation record for the poll endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationView {
    pub operation_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}
