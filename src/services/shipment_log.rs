//! Shipment-log / reservation service client
//!
//! External warehouse accounting API: shipment rows per (supply, wild) with
//! quantities, reservation release on dispatch, and reservation-with-movement
//! when orders migrate into a fresh hanging supply.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::supplies::SupplyShipmentInfo;

pub const DEFAULT_WAREHOUSE_ID: i32 = 1;
pub const DELIVERY_TYPE_FBS: &str = "ФБС";

/// Days a movement reservation stays valid before the warehouse reclaims it
const RESERVATION_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRow {
    pub author: String,
    pub supply_id: String,
    /// wild code
    pub product_id: String,
    pub warehouse_id: i32,
    pub delivery_type: String,
    pub wb_warehouse: String,
    pub account: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
struct ReleaseReservationRequest {
    supply_id: String,
    quantity_shipped: i64,
    product_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleasedReserve {
    pub supply_id: String,
    pub product_reserves_id: i64,
}

#[derive(Debug, Clone, Serialize)]
struct MoveReservationRequest {
    product_id: String,
    warehouse_id: i32,
    ordered: i64,
    account: String,
    supply_id: String,
    move_from_supply: String,
    quantity_to_move: i64,
    reserve_date: String,
    expires_at: String,
}

/// Builds shipment rows grouped by (supply, wild) with per-wild quantities.
/// Orders without a wild mapping are skipped with a warning.
pub fn prepare_shipment_rows(
    supplies: &[SupplyShipmentInfo],
    order_wild_map: &HashMap<i64, String>,
    author: &str,
) -> Vec<ShipmentRow> {
    let mut rows = Vec::new();

    for supply in supplies {
        let mut wild_counts: HashMap<&str, i64> = HashMap::new();
        for order_id in &supply.order_ids {
            match order_wild_map.get(order_id) {
                Some(wild) => *wild_counts.entry(wild.as_str()).or_insert(0) += 1,
                None => tracing::warn!(
                    "No wild mapping for order {} in supply {}",
                    order_id,
                    supply.supply_id
                ),
            }
        }

        if wild_counts.is_empty() {
            tracing::warn!(
                "Supply {} produced no shipment rows (no wild mappings)",
                supply.supply_id
            );
            continue;
        }

        for (wild, quantity) in wild_counts {
            rows.push(ShipmentRow {
                author: author.to_string(),
                supply_id: supply.supply_id.clone(),
                product_id: wild.to_string(),
                warehouse_id: DEFAULT_WAREHOUSE_ID,
                delivery_type: DELIVERY_TYPE_FBS.to_string(),
                wb_warehouse: String::new(),
                account: supply.account.clone(),
                quantity,
            });
        }
    }

    tracing::info!("Prepared {} shipment rows", rows.len());
    rows
}

#[derive(Clone)]
pub struct ShipmentLogService {
    client: Client,
    base_url: String,
}

impl ShipmentLogService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Posts shipment rows. Failures are surfaced to the caller, which treats
    /// them as a failed-but-not-fatal step.
    pub async fn save_shipments(
        &self,
        rows: &[ShipmentRow],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if rows.is_empty() {
            tracing::debug!("No shipment rows to save");
            return Ok(());
        }

        let url = format!("{}/shipments", self.base_url);
        let response = self.client.post(&url).json(rows).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Shipment log API error {}: {}", status, body).into());
        }

        tracing::info!("Saved {} shipment rows", rows.len());
        Ok(())
    }

    /// Releases the reservation held against a supply after dispatch
    pub async fn release_reservation(
        &self,
        supply_id: &str,
        product_id: &str,
        quantity_shipped: i64,
    ) -> Result<Vec<ReleasedReserve>, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/reserves/release", self.base_url);
        let body = ReleaseReservationRequest {
            supply_id: supply_id.to_string(),
            quantity_shipped,
            product_id: product_id.to_string(),
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Reservation release error {}: {}", status, text).into());
        }

        let released: Vec<ReleasedReserve> = response.json().await?;
        tracing::info!(
            "Released reservation for supply {} ({}), {} rows",
            supply_id,
            product_id,
            released.len()
        );
        Ok(released)
    }

    /// Creates a reservation against a new hanging supply while recording the
    /// supply it was moved from, keeping the reservation ledger traceable.
    pub async fn create_reservation_with_movement(
        &self,
        wild: &str,
        account: &str,
        new_supply_id: &str,
        old_supply_id: &str,
        quantity: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = Utc::now();
        let url = format!("{}/reserves/move", self.base_url);
        let body = MoveReservationRequest {
            product_id: wild.to_string(),
            warehouse_id: DEFAULT_WAREHOUSE_ID,
            ordered: quantity,
            account: account.to_string(),
            supply_id: new_supply_id.to_string(),
            move_from_supply: old_supply_id.to_string(),
            quantity_to_move: quantity,
            reserve_date: now.format("%Y-%m-%d").to_string(),
            expires_at: (now + Duration::days(RESERVATION_TTL_DAYS))
                .format("%Y-%m-%d")
                .to_string(),
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Reservation movement error {}: {}", status, text).into());
        }

        tracing::info!(
            "Moved reservation of {} x{} from {} to {} ({})",
            wild,
            quantity,
            old_supply_id,
            new_supply_id,
            account
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_rows_groups_by_wild_with_counts() {
        let supplies = vec![SupplyShipmentInfo {
            supply_id: "WB-GI-1".to_string(),
            account: "acc1".to_string(),
            order_ids: vec![1, 2, 3],
        }];
        let wild_map = HashMap::from([
            (1, "wild5".to_string()),
            (2, "wild5".to_string()),
            (3, "wild9".to_string()),
        ]);

        let mut rows = prepare_shipment_rows(&supplies, &wild_map, "operator");
        rows.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, "wild5");
        assert_eq!(rows[0].quantity, 2);
        assert_eq!(rows[1].product_id, "wild9");
        assert_eq!(rows[1].quantity, 1);
        assert_eq!(rows[0].delivery_type, DELIVERY_TYPE_FBS);
    }

    #[test]
    fn test_prepare_rows_skips_unmapped_orders() {
        let supplies = vec![SupplyShipmentInfo {
            supply_id: "WB-GI-1".to_string(),
            account: "acc1".to_string(),
            order_ids: vec![1, 99],
        }];
        let wild_map = HashMap::from([(1, "wild5".to_string())]);

        let rows = prepare_shipment_rows(&supplies, &wild_map, "operator");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 1);
    }

    #[test]
    fn test_prepare_rows_empty_when_nothing_maps() {
        let supplies = vec![SupplyShipmentInfo {
            supply_id: "WB-GI-1".to_string(),
            account: "acc1".to_string(),
            order_ids: vec![99],
        }];

        let rows = prepare_shipment_rows(&supplies, &HashMap::new(), "operator");
        assert!(rows.is_empty());
    }
}
