//! Append-only order status journal
//!
//! Every lifecycle transition lands here. Inserts use a targetless
//! ON CONFLICT DO NOTHING against the unique (order_id, status, supply_id,
//! account) index, so replaying a batch (operation-id retry, reconnect) is a
//! safe no-op rather than an error.

use std::collections::HashSet;

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set};

use crate::entities::order_status_log;
use crate::entities::prelude::OrderStatusLog;
use crate::models::order_status::OrderStatus;

/// One journal row to insert
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub order_id: i64,
    pub status: OrderStatus,
    pub supply_id: Option<String>,
    pub account: String,
    pub operator: Option<String>,
}

impl LedgerEntry {
    pub fn new(
        order_id: i64,
        status: OrderStatus,
        supply_id: Option<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            status,
            supply_id,
            account: account.into(),
            operator: None,
        }
    }

    pub fn with_operator(mut self, operator: Option<String>) -> Self {
        self.operator = operator;
        self
    }
}

/// Batch insert with duplicate suppression. Returns the number of rows the
/// database actually persisted (replayed duplicates count as zero).
pub async fn insert_batch(
    db: &DatabaseConnection,
    entries: Vec<LedgerEntry>,
) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    if entries.is_empty() {
        tracing::debug!("No entries to insert into order_status_log");
        return Ok(0);
    }

    let attempted = entries.len();
    let models: Vec<order_status_log::ActiveModel> = entries
        .into_iter()
        .map(|entry| order_status_log::ActiveModel {
            order_id: Set(entry.order_id),
            status: Set(entry.status.as_str().to_string()),
            supply_id: Set(entry.supply_id),
            account: Set(entry.account),
            operator: Set(entry.operator),
            ..Default::default()
        })
        .collect();

    let inserted = OrderStatusLog::insert_many(models)
        .on_conflict(OnConflict::new().do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    tracing::info!(
        "order_status_log: {} of {} rows inserted (duplicates suppressed)",
        inserted,
        attempted
    );

    Ok(inserted)
}

/// Distinct order ids the ledger has seen for the given (supply_id, account)
/// pairs. Used to cross-check dispatch requests against recorded history.
pub async fn get_order_ids_by_supplies(
    db: &DatabaseConnection,
    supplies: &[(String, String)],
) -> Result<Vec<(i64, String)>, Box<dyn std::error::Error + Send + Sync>> {
    if supplies.is_empty() {
        return Ok(Vec::new());
    }

    let mut condition = sea_orm::Condition::any();
    for (supply_id, account) in supplies {
        condition = condition.add(
            sea_orm::Condition::all()
                .add(order_status_log::Column::SupplyId.eq(supply_id.clone()))
                .add(order_status_log::Column::Account.eq(account.clone())),
        );
    }

    let rows: Vec<(i64, Option<String>)> = OrderStatusLog::find()
        .select_only()
        .column(order_status_log::Column::OrderId)
        .column(order_status_log::Column::SupplyId)
        .filter(condition)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for (order_id, supply_id) in rows {
        let Some(supply_id) = supply_id else { continue };
        if seen.insert((order_id, supply_id.clone())) {
            result.push((order_id, supply_id));
        }
    }

    tracing::info!(
        "Found {} distinct order ids for {} supplies in the ledger",
        result.len(),
        supplies.len()
    );

    Ok(result)
}
