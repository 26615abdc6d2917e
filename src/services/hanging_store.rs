//! Persistence for hanging (virtual) supplies
//!
//! A hanging supply is created locally the moment orders are moved into it
//! and keeps three JSON ledgers: the order snapshot (`order_data`), the
//! fictitious dispatches (`shipped_orders`) and the reconciliation diff
//! (`changes_log`, append-only). `is_fictitious_delivered` is one-way.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::entities::hanging_supplies;
use crate::entities::prelude::HangingSupplies;
use crate::models::orders::WbOrder;

/// Tag stored in order_data.source for supplies created by the move flow
pub const SOURCE_CREATED_FOR_MOVE: &str = "created_for_move";
/// Operator recorded when auto-promotion marks a supply fictitious
pub const OPERATOR_AUTO_SYSTEM: &str = "auto_system";

/// One fictitious dispatch out of a hanging supply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippedOrderEntry {
    pub order_id: i64,
    pub shipped_at: String,
    pub operator: String,
}

/// One reconciliation diff row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub timestamp: String,
    /// "added" | "removed"
    pub change_type: String,
    pub order_id: i64,
    pub order_data: serde_json::Value,
    pub sync_session: String,
}

fn order_data_json(orders: &[WbOrder], source: Option<&str>) -> serde_json::Value {
    let mut data = serde_json::json!({ "orders": orders });
    if let Some(source) = source {
        data["source"] = serde_json::Value::String(source.to_string());
    }
    data
}

/// Orders out of a record's snapshot; malformed JSON degrades to empty with a
/// logged error so one bad row never aborts a whole pass.
pub fn parse_orders(record: &hanging_supplies::Model) -> Vec<WbOrder> {
    match record.order_data.get("orders") {
        Some(orders) => match serde_json::from_value(orders.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    "Malformed order_data for hanging supply {} ({}): {}",
                    record.supply_id,
                    record.account,
                    e
                );
                Vec::new()
            }
        },
        None => {
            tracing::error!(
                "order_data without orders key for hanging supply {} ({})",
                record.supply_id,
                record.account
            );
            Vec::new()
        }
    }
}

pub fn parse_shipped(record: &hanging_supplies::Model) -> Vec<ShippedOrderEntry> {
    match serde_json::from_value(record.shipped_orders.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(
                "Malformed shipped_orders for hanging supply {} ({}): {}",
                record.supply_id,
                record.account,
                e
            );
            Vec::new()
        }
    }
}

/// A record is fully processed once every snapshot order has been
/// fictitiously shipped; such records stay queryable but drop out of listings.
pub fn is_fully_processed(record: &hanging_supplies::Model) -> bool {
    let orders = parse_orders(record);
    if orders.is_empty() {
        return false;
    }
    let shipped: std::collections::HashSet<i64> =
        parse_shipped(record).into_iter().map(|s| s.order_id).collect();
    orders.iter().all(|o| shipped.contains(&o.id))
}

/// Upserts a hanging supply record with a fresh order snapshot
pub async fn save(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
    orders: &[WbOrder],
    operator: Option<String>,
    source: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let model = hanging_supplies::ActiveModel {
        supply_id: Set(supply_id.to_string()),
        account: Set(account.to_string()),
        order_data: Set(order_data_json(orders, source)),
        shipped_orders: Set(serde_json::json!([])),
        changes_log: Set(serde_json::json!([])),
        is_fictitious_delivered: Set(false),
        operator: Set(operator),
        ..Default::default()
    };

    HangingSupplies::insert(model)
        .on_conflict(
            OnConflict::columns([
                hanging_supplies::Column::SupplyId,
                hanging_supplies::Column::Account,
            ])
            .update_column(hanging_supplies::Column::OrderData)
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::info!("Saved hanging supply {} ({})", supply_id, account);
    Ok(())
}

pub async fn get(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
) -> Result<Option<hanging_supplies::Model>, Box<dyn std::error::Error + Send + Sync>> {
    let record = HangingSupplies::find()
        .filter(hanging_supplies::Column::SupplyId.eq(supply_id))
        .filter(hanging_supplies::Column::Account.eq(account))
        .one(db)
        .await?;
    Ok(record)
}

/// All records still subject to reconciliation (not fictitious-delivered)
pub async fn get_active(
    db: &DatabaseConnection,
) -> Result<Vec<hanging_supplies::Model>, Box<dyn std::error::Error + Send + Sync>> {
    let records = HangingSupplies::find()
        .filter(hanging_supplies::Column::IsFictitiousDelivered.eq(false))
        .order_by_desc(hanging_supplies::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(records)
}

/// Fictitious-delivered records that still have unshipped orders
pub async fn get_fictitious_pending(
    db: &DatabaseConnection,
) -> Result<Vec<hanging_supplies::Model>, Box<dyn std::error::Error + Send + Sync>> {
    let records = HangingSupplies::find()
        .filter(hanging_supplies::Column::IsFictitiousDelivered.eq(true))
        .order_by_desc(hanging_supplies::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(records
        .into_iter()
        .filter(|r| !is_fully_processed(r))
        .collect())
}

/// Overwrites the order snapshot with the current marketplace list. An empty
/// list is valid and meaningful (the supply was drained externally).
pub async fn update_order_data(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
    orders: &[WbOrder],
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let Some(record) = get(db, supply_id, account).await? else {
        tracing::warn!(
            "Hanging supply {} ({}) not found for order_data update",
            supply_id,
            account
        );
        return Ok(false);
    };

    // Keep any non-orders keys (source tag) intact
    let mut data = record.order_data.clone();
    data["orders"] = serde_json::to_value(orders)?;

    let mut active = record.into_active_model();
    active.order_data = Set(data);
    active.update(db).await?;

    tracing::info!(
        "Updated order_data for hanging supply {} ({}): {} orders",
        supply_id,
        account,
        orders.len()
    );
    Ok(true)
}

/// Appends reconciliation diff entries; existing log rows are never rewritten
pub async fn append_changes_log(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
    entries: &[ChangeLogEntry],
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    if entries.is_empty() {
        return Ok(true);
    }

    let Some(record) = get(db, supply_id, account).await? else {
        tracing::warn!(
            "Hanging supply {} ({}) not found for changes_log append",
            supply_id,
            account
        );
        return Ok(false);
    };

    let mut log: Vec<serde_json::Value> =
        serde_json::from_value(record.changes_log.clone()).unwrap_or_default();
    for entry in entries {
        log.push(serde_json::to_value(entry)?);
    }

    let mut active = record.into_active_model();
    active.changes_log = Set(serde_json::Value::Array(log));
    active.update(db).await?;

    tracing::info!(
        "Appended {} changes_log entries for hanging supply {} ({})",
        entries.len(),
        supply_id,
        account
    );
    Ok(true)
}

/// Records fictitious dispatches out of the supply
pub async fn append_shipped_orders(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
    entries: &[ShippedOrderEntry],
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    if entries.is_empty() {
        return Ok(true);
    }

    let Some(record) = get(db, supply_id, account).await? else {
        tracing::warn!(
            "Hanging supply {} ({}) not found for shipped_orders append",
            supply_id,
            account
        );
        return Ok(false);
    };

    let mut shipped = parse_shipped(&record);
    shipped.extend(entries.iter().cloned());

    let mut active = record.into_active_model();
    active.shipped_orders = Set(serde_json::to_value(&shipped)?);
    active.update(db).await?;

    tracing::info!(
        "Recorded {} shipped orders for hanging supply {} ({})",
        entries.len(),
        supply_id,
        account
    );
    Ok(true)
}

/// Removes the record of a hanging supply that was deleted on the
/// marketplace (empty-supply cleanup only)
pub async fn remove(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    HangingSupplies::delete_many()
        .filter(hanging_supplies::Column::SupplyId.eq(supply_id))
        .filter(hanging_supplies::Column::Account.eq(account))
        .exec(db)
        .await?;
    tracing::info!("Removed hanging supply record {} ({})", supply_id, account);
    Ok(())
}

/// One-way fictitious-delivery flag. Returns false when the record is already
/// marked (callers treat that as an idempotent no-op, not an error).
pub async fn mark_fictitious_delivered(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
    operator: &str,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let Some(record) = get(db, supply_id, account).await? else {
        return Err(format!(
            "Hanging supply {} ({}) not found for fictitious delivery",
            supply_id, account
        )
        .into());
    };

    if record.is_fictitious_delivered {
        tracing::info!(
            "Hanging supply {} ({}) already marked fictitious-delivered",
            supply_id,
            account
        );
        return Ok(false);
    }

    let mut active = record.into_active_model();
    active.is_fictitious_delivered = Set(true);
    active.fictitious_delivered_at = Set(Some(Utc::now().into()));
    active.fictitious_delivery_operator = Set(Some(operator.to_string()));
    active.update(db).await?;

    tracing::info!(
        "Marked hanging supply {} ({}) fictitious-delivered by {}",
        supply_id,
        account,
        operator
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(orders: serde_json::Value, shipped: serde_json::Value) -> hanging_supplies::Model {
        hanging_supplies::Model {
            id: 1,
            supply_id: "WB-GI-1".to_string(),
            account: "acc1".to_string(),
            order_data: orders,
            shipped_orders: shipped,
            changes_log: serde_json::json!([]),
            is_fictitious_delivered: false,
            fictitious_delivered_at: None,
            fictitious_delivery_operator: None,
            operator: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_parse_orders_tolerates_malformed_json() {
        let record = record_with(serde_json::json!({"orders": "not-a-list"}), serde_json::json!([]));
        assert!(parse_orders(&record).is_empty());

        let record = record_with(serde_json::json!({}), serde_json::json!([]));
        assert!(parse_orders(&record).is_empty());
    }

    #[test]
    fn test_fully_processed_requires_every_order_shipped() {
        let orders = serde_json::json!({"orders": [
            {"id": 1, "article": "wild5", "nmId": 10, "convertedPrice": 100, "createdAt": ""},
            {"id": 2, "article": "wild5", "nmId": 11, "convertedPrice": 100, "createdAt": ""}
        ]});

        let half_shipped = record_with(
            orders.clone(),
            serde_json::json!([{"order_id": 1, "shipped_at": "", "operator": "op"}]),
        );
        assert!(!is_fully_processed(&half_shipped));

        let all_shipped = record_with(
            orders,
            serde_json::json!([
                {"order_id": 1, "shipped_at": "", "operator": "op"},
                {"order_id": 2, "shipped_at": "", "operator": "op"}
            ]),
        );
        assert!(is_fully_processed(&all_shipped));
    }

    #[test]
    fn test_empty_snapshot_is_not_fully_processed() {
        let record = record_with(serde_json::json!({"orders": []}), serde_json::json!([]));
        assert!(!is_fully_processed(&record));
    }
}
