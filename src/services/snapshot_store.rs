//! Local order-status snapshot mirror
//!
//! One row per (order_id, account), refreshed by the background order sync.
//! Serves two purposes: NEW-order detection and an ERP-formatting fallback
//! when the live WB fetch misses an order id.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set};

use crate::entities::order_status_snapshots;
use crate::entities::prelude::OrderStatusSnapshots;
use crate::models::orders::{OrderStatusPair, WbOrder};

/// Upserts the mirror rows for one account's order list. Statuses are
/// optional; rows keep their previous status when the map has no entry.
pub async fn upsert_batch(
    db: &DatabaseConnection,
    account: &str,
    orders: &[WbOrder],
    statuses: &HashMap<i64, OrderStatusPair>,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    if orders.is_empty() {
        return Ok(0);
    }

    // Chunked to keep statement parameter counts reasonable
    for chunk in orders.chunks(500) {
        let models: Vec<order_status_snapshots::ActiveModel> = chunk
            .iter()
            .map(|order| {
                let pair = statuses.get(&order.id);
                order_status_snapshots::ActiveModel {
                    order_id: Set(order.id),
                    nm_id: Set(order.nm_id),
                    converted_price: Set(order.converted_price as i32),
                    account: Set(account.to_string()),
                    supplier_status: Set(pair.map(|p| p.supplier_status.clone())),
                    wb_status: Set(pair.map(|p| p.wb_status.clone())),
                    created_at: Set(parse_created_at(&order.created_at)),
                    updated_at: Set(Utc::now().into()),
                    ..Default::default()
                }
            })
            .collect();

        let mut conflict = OnConflict::columns([
            order_status_snapshots::Column::OrderId,
            order_status_snapshots::Column::Account,
        ]);
        conflict
            .update_columns([
                order_status_snapshots::Column::NmId,
                order_status_snapshots::Column::ConvertedPrice,
                order_status_snapshots::Column::CreatedAt,
                order_status_snapshots::Column::UpdatedAt,
            ])
            .update_columns(if statuses.is_empty() {
                vec![]
            } else {
                vec![
                    order_status_snapshots::Column::SupplierStatus,
                    order_status_snapshots::Column::WbStatus,
                ]
            });

        OrderStatusSnapshots::insert_many(models)
            .on_conflict(conflict.to_owned())
            .exec_without_returning(db)
            .await?;
    }

    tracing::info!(
        "Upserted {} order snapshots for account {}",
        orders.len(),
        account
    );
    Ok(orders.len())
}

fn parse_created_at(raw: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    raw.parse::<DateTime<Utc>>().ok().map(Into::into)
}

/// Order ids the mirror already knows for an account
pub async fn get_known_order_ids(
    db: &DatabaseConnection,
    account: &str,
) -> Result<HashSet<i64>, Box<dyn std::error::Error + Send + Sync>> {
    let ids: Vec<i64> = OrderStatusSnapshots::find()
        .select_only()
        .column(order_status_snapshots::Column::OrderId)
        .filter(order_status_snapshots::Column::Account.eq(account))
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Snapshot rows for the given ids in WB-order form, used as the ERP
/// formatting fallback
pub async fn get_orders_for_erp(
    db: &DatabaseConnection,
    account: &str,
    order_ids: &[i64],
) -> Result<Vec<WbOrder>, Box<dyn std::error::Error + Send + Sync>> {
    if order_ids.is_empty() {
        tracing::warn!("Empty order id list for snapshot lookup");
        return Ok(Vec::new());
    }

    let rows = OrderStatusSnapshots::find()
        .filter(order_status_snapshots::Column::Account.eq(account))
        .filter(order_status_snapshots::Column::OrderId.is_in(order_ids.to_vec()))
        .all(db)
        .await?;

    let orders: Vec<WbOrder> = rows
        .into_iter()
        .map(|row| WbOrder {
            id: row.order_id,
            article: String::new(),
            nm_id: row.nm_id,
            converted_price: row.converted_price as i64,
            created_at: row
                .created_at
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
            supply_id: None,
        })
        .collect();

    tracing::info!(
        "Snapshot lookup returned {} of {} orders for account {}",
        orders.len(),
        order_ids.len(),
        account
    );
    Ok(orders)
}
