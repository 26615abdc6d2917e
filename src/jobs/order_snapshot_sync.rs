//! Order mirror sync
//!
//! Periodically pulls every account's full order list, refreshes the local
//! snapshot table and journals a NEW status for order ids seen for the
//! first time. The mirror also backs the ERP formatting fallback.

use std::collections::HashMap;

use futures_util::future::join_all;
use sea_orm::DatabaseConnection;
use tokio::time::{interval, Duration};

use crate::models::order_status::OrderStatus;
use crate::services::snapshot_store;
use crate::services::status_ledger::{self, LedgerEntry};
use crate::services::sync_status::{self, intervals, jobs};
use crate::services::wb_client::WbApiService;

pub async fn start_order_snapshot_sync_job(db: DatabaseConnection, wb: WbApiService) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(900)); // 15 minutes

        loop {
            interval.tick().await;

            match sync_status::should_sync(
                &db,
                jobs::ORDER_SNAPSHOT_SYNC,
                intervals::ORDER_SNAPSHOT_SYNC,
            )
            .await
            {
                Ok(true) => match sync_orders(&db, &wb).await {
                    Ok((synced, new_logged)) => {
                        tracing::info!(
                            "[{}] Synced {} orders, {} new",
                            jobs::ORDER_SNAPSHOT_SYNC,
                            synced,
                            new_logged
                        );
                        if let Err(e) = sync_status::record_success(
                            &db,
                            jobs::ORDER_SNAPSHOT_SYNC,
                            intervals::ORDER_SNAPSHOT_SYNC,
                        )
                        .await
                        {
                            tracing::warn!("Failed to record sync success: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("[{}] Sync failed: {}", jobs::ORDER_SNAPSHOT_SYNC, e);
                        if let Err(e2) = sync_status::record_failure(
                            &db,
                            jobs::ORDER_SNAPSHOT_SYNC,
                            &e.to_string(),
                            intervals::ORDER_SNAPSHOT_SYNC,
                        )
                        .await
                        {
                            tracing::warn!("Failed to record sync failure: {}", e2);
                        }
                    }
                },
                Ok(false) => {
                    tracing::debug!(
                        "[{}] Skipping sync (recently synced)",
                        jobs::ORDER_SNAPSHOT_SYNC
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to check sync status: {}", e);
                }
            }
        }
    });
}

async fn sync_orders(
    db: &DatabaseConnection,
    wb: &WbApiService,
) -> Result<(usize, usize), Box<dyn std::error::Error + Send + Sync>> {
    let futures: Vec<_> = wb
        .accounts()
        .into_iter()
        .map(|account| {
            let wb = wb.clone();
            async move {
                let result = wb.get_orders(&account).await;
                (account, result)
            }
        })
        .collect();

    let mut total_synced = 0;
    let mut total_new = 0;

    for (account, result) in join_all(futures).await {
        let orders = match result {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!("Failed to fetch orders for account {}: {}", account, e);
                continue;
            }
        };
        if orders.is_empty() {
            continue;
        }

        // Statuses enrich the mirror but their failure is not fatal here
        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let statuses = match wb.get_order_statuses(&account, &order_ids).await {
            Ok(statuses) => statuses,
            Err(e) => {
                tracing::warn!("Status fetch failed for account {}: {}", account, e);
                HashMap::new()
            }
        };

        // NEW journal entries for ids the mirror has never seen
        let known = snapshot_store::get_known_order_ids(db, &account).await?;
        let new_entries: Vec<LedgerEntry> = orders
            .iter()
            .filter(|o| !known.contains(&o.id))
            .map(|o| LedgerEntry::new(o.id, OrderStatus::New, None, account.clone()))
            .collect();
        total_new += new_entries.len();
        status_ledger::insert_batch(db, new_entries).await?;

        total_synced += snapshot_store::upsert_batch(db, &account, &orders, &statuses).await?;
    }

    Ok((total_synced, total_new))
}
