//! Empty hanging-supply cleanup
//!
//! Deletes hanging supplies that stayed empty across two consecutive passes.
//! The single-pass set is held in the task between iterations; a restart
//! resets the window, which can only delay a deletion, never cause one
//! early. Every deletion is preceded by a direct WB re-check, and a supply
//! whose order fetch failed is never considered for deletion at all.

use std::collections::HashSet;

use sea_orm::DatabaseConnection;
use tokio::time::{interval, Duration};

use crate::services::hanging_store;
use crate::services::sync_status::{self, intervals, jobs};
use crate::services::wb_client::WbApiService;

pub async fn start_empty_supply_cleanup_job(db: DatabaseConnection, wb: WbApiService) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(3600)); // 1 hour
        let mut previously_empty: HashSet<String> = HashSet::new();

        loop {
            interval.tick().await;

            match sync_status::should_sync(
                &db,
                jobs::EMPTY_SUPPLY_CLEANUP,
                intervals::EMPTY_SUPPLY_CLEANUP,
            )
            .await
            {
                Ok(true) => {
                    match cleanup_pass(&db, &wb, &mut previously_empty).await {
                        Ok(deleted) => {
                            tracing::info!(
                                "[{}] Cleanup pass complete: {} supplies deleted",
                                jobs::EMPTY_SUPPLY_CLEANUP,
                                deleted
                            );
                            if let Err(e) = sync_status::record_success(
                                &db,
                                jobs::EMPTY_SUPPLY_CLEANUP,
                                intervals::EMPTY_SUPPLY_CLEANUP,
                            )
                            .await
                            {
                                tracing::warn!("Failed to record sync success: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                "[{}] Cleanup pass failed: {}",
                                jobs::EMPTY_SUPPLY_CLEANUP,
                                e
                            );
                            if let Err(e2) = sync_status::record_failure(
                                &db,
                                jobs::EMPTY_SUPPLY_CLEANUP,
                                &e.to_string(),
                                intervals::EMPTY_SUPPLY_CLEANUP,
                            )
                            .await
                            {
                                tracing::warn!("Failed to record sync failure: {}", e2);
                            }
                        }
                    }
                }
                Ok(false) => {
                    tracing::debug!(
                        "[{}] Skipping cleanup (recently run)",
                        jobs::EMPTY_SUPPLY_CLEANUP
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to check sync status: {}", e);
                }
            }
        }
    });
}

fn supply_key(account: &str, supply_id: &str) -> String {
    format!("{}:{}", account, supply_id)
}

async fn cleanup_pass(
    db: &DatabaseConnection,
    wb: &WbApiService,
    previously_empty: &mut HashSet<String>,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let records = hanging_store::get_active(db).await?;

    // Current empties, observed live. Fetch failures exclude the supply from
    // the pass so API outages cannot lead to deletions.
    let mut current_empty: HashSet<String> = HashSet::new();
    let mut observed: HashSet<String> = HashSet::new();
    for record in &records {
        let key = supply_key(&record.account, &record.supply_id);
        match wb.get_supply_orders(&record.account, &record.supply_id).await {
            Ok(orders) => {
                observed.insert(key.clone());
                if orders.is_empty() {
                    current_empty.insert(key);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Could not fetch orders of {} ({}), excluding from cleanup: {}",
                    record.supply_id,
                    record.account,
                    e
                );
            }
        }
    }

    let to_delete: HashSet<String> = previously_empty
        .intersection(&current_empty)
        .cloned()
        .collect();
    tracing::info!(
        "Cleanup: {} empty now, {} empty twice in a row",
        current_empty.len(),
        to_delete.len()
    );

    let mut deleted = 0;
    for key in &to_delete {
        let Some((account, supply_id)) = key.split_once(':') else {
            continue;
        };

        // Final re-check straight against WB before the irreversible delete
        match wb.get_supply_orders(account, supply_id).await {
            Ok(orders) if orders.is_empty() => {}
            Ok(orders) => {
                tracing::warn!(
                    "Supply {} ({}) has {} orders on re-check, deletion cancelled",
                    supply_id,
                    account,
                    orders.len()
                );
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    "Re-check failed for {} ({}), deletion cancelled: {}",
                    supply_id,
                    account,
                    e
                );
                continue;
            }
        }

        match wb.delete_supply(account, supply_id).await {
            Ok(()) => {
                tracing::info!("Deleted empty supply {} ({})", supply_id, account);
                if let Err(e) = hanging_store::remove(db, supply_id, account).await {
                    tracing::error!(
                        "Supply {} ({}) deleted on WB but record removal failed: {}",
                        supply_id,
                        account,
                        e
                    );
                }
                deleted += 1;
            }
            Err(e) => {
                tracing::error!("Failed to delete supply {} ({}): {}", supply_id, account, e);
            }
        }
    }

    // Next pass compares against supplies that are empty now and still exist
    *previously_empty = current_empty
        .difference(&to_delete)
        .filter(|key| observed.contains(*key))
        .cloned()
        .collect();

    Ok(deleted)
}
