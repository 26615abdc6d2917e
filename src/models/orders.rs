//! Marketplace order DTOs shared by services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assembly task as the WB marketplace API returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WbOrder {
    pub id: i64,
    #[serde(default)]
    pub article: String,
    #[serde(rename = "nmId", default)]
    pub nm_id: i64,
    /// Price in kopecks
    #[serde(rename = "convertedPrice", default)]
    pub converted_price: i64,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(rename = "supplyId", default, skip_serializing_if = "Option::is_none")]
    pub supply_id: Option<String>,
}

impl WbOrder {
    /// Creation timestamp parsed from the API's ISO string; orders with a
    /// malformed timestamp sort first.
    pub fn created_at_parsed(&self) -> DateTime<Utc> {
        self.created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// (supplierStatus, wbStatus) pair from the batched status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusPair {
    pub supplier_status: String,
    pub wb_status: String,
}

impl OrderStatusPair {
    pub fn new(supplier_status: impl Into<String>, wb_status: impl Into<String>) -> Self {
        Self {
            supplier_status: supplier_status.into(),
            wb_status: wb_status.into(),
        }
    }

    /// Placeholder written when the status lookup for a whole account failed;
    /// classified as BLOCKED_INVALID_STATUS by the move policy.
    pub fn lookup_error() -> Self {
        Self::new("error", "error")
    }
}

/// Sticker returned by the WB sticker endpoint (base64 PNG in `file`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WbSticker {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(default)]
    pub file: String,
    #[serde(rename = "partA", default)]
    pub part_a: i64,
    #[serde(rename = "partB", default)]
    pub part_b: i64,
    #[serde(default)]
    pub barcode: String,
}

/// Order enriched with its location, used as selection/movement input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateOrder {
    pub order_id: i64,
    pub nm_id: i64,
    pub wild: String,
    pub account: String,
    /// Supply the order currently sits in on the marketplace
    pub supply_id: String,
    /// Price in kopecks
    pub price: i64,
    pub created_at: DateTime<Utc>,
}
