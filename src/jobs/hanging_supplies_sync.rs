//! Background reconciliation of hanging supplies
//!
//! Periodically re-derives the live marketplace order set for every
//! non-fictitious hanging supply, appends add/remove diffs to its
//! changes_log (one sync_session id per pass) and overwrites the snapshot.
//! A second pass auto-promotes hanging records the marketplace no longer
//! reports as assembling: WB moved them into delivery without our
//! deliver-fictitious call, so they are tagged fictitious-delivered with
//! operator auto_system. Empty records are deliberately left to the cleanup
//! job.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::time::{interval, Duration};

use crate::services::hanging_store::{self, OPERATOR_AUTO_SYSTEM};
use crate::services::supply_lifecycle::SupplyLifecycleService;
use crate::services::sync_status::{self, intervals, jobs};
use crate::services::wb_client::WbApiService;

pub async fn start_hanging_supplies_sync_job(
    db: DatabaseConnection,
    wb: WbApiService,
    lifecycle: SupplyLifecycleService,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(1800)); // 30 minutes

        loop {
            interval.tick().await;

            match sync_status::should_sync(
                &db,
                jobs::HANGING_SUPPLIES_SYNC,
                intervals::HANGING_SUPPLIES_SYNC,
            )
            .await
            {
                Ok(true) => {
                    tracing::info!("[{}] Starting hanging supplies sync", jobs::HANGING_SUPPLIES_SYNC);
                    match sync_hanging_supplies(&db, &wb, &lifecycle).await {
                        Ok(stats) => {
                            tracing::info!(
                                "[{}] Sync complete: {} supplies, {} changes, {} auto-promoted",
                                jobs::HANGING_SUPPLIES_SYNC,
                                stats.total_supplies,
                                stats.total_changes,
                                stats.auto_promoted
                            );
                            if let Err(e) = sync_status::record_success(
                                &db,
                                jobs::HANGING_SUPPLIES_SYNC,
                                intervals::HANGING_SUPPLIES_SYNC,
                            )
                            .await
                            {
                                tracing::warn!("Failed to record sync success: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                "[{}] Sync failed: {}",
                                jobs::HANGING_SUPPLIES_SYNC,
                                e
                            );
                            if let Err(e2) = sync_status::record_failure(
                                &db,
                                jobs::HANGING_SUPPLIES_SYNC,
                                &e.to_string(),
                                intervals::HANGING_SUPPLIES_SYNC,
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
                        "[{}] Skipping sync (recently synced)",
                        jobs::HANGING_SUPPLIES_SYNC
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to check sync status: {}", e);
                }
            }
        }
    });
}

pub struct SyncStats {
    pub total_supplies: usize,
    pub processed_supplies: usize,
    pub total_changes: usize,
    pub auto_promoted: usize,
}

async fn sync_hanging_supplies(
    db: &DatabaseConnection,
    wb: &WbApiService,
    lifecycle: &SupplyLifecycleService,
) -> Result<SyncStats, Box<dyn std::error::Error + Send + Sync>> {
    let records = hanging_store::get_active(db).await?;
    let sync_session = format!("sync_{}", Utc::now().format("%Y%m%d_%H%M%S"));

    tracing::info!(
        "Reconciling {} hanging supplies (session {})",
        records.len(),
        sync_session
    );

    let mut processed = 0;
    let mut total_changes = 0;

    // One record failing (malformed JSON, WB error) never aborts the pass
    for record in &records {
        match lifecycle.reconcile_hanging_supply(record, &sync_session).await {
            Ok(changes) => {
                if changes > 0 {
                    processed += 1;
                    total_changes += changes;
                }
            }
            Err(e) => {
                tracing::error!(
                    "Reconciliation failed for supply {} ({}): {}",
                    record.supply_id,
                    record.account,
                    e
                );
                continue;
            }
        }
    }

    let auto_promoted = auto_promote_delivered(db, wb, &records).await;

    Ok(SyncStats {
        total_supplies: records.len(),
        processed_supplies: processed,
        total_changes,
        auto_promoted,
    })
}

/// Tags hanging records the marketplace no longer lists as assembling.
/// Empty records are excluded: transient WB reporting gaps would otherwise
/// promote a supply that is merely slow to show its orders.
async fn auto_promote_delivered(
    db: &DatabaseConnection,
    wb: &WbApiService,
    records: &[crate::entities::hanging_supplies::Model],
) -> usize {
    let accounts: HashSet<&str> = records.iter().map(|r| r.account.as_str()).collect();

    // Still-assembling supply ids per account; an account whose listing call
    // failed is skipped entirely rather than promoting on missing data
    let mut open_by_account: HashMap<String, HashSet<String>> = HashMap::new();
    for account in accounts {
        match wb.get_open_supplies(account).await {
            Ok(supplies) => {
                open_by_account.insert(
                    account.to_string(),
                    supplies.into_iter().map(|s| s.id).collect(),
                );
            }
            Err(e) => {
                tracing::error!(
                    "Could not list open supplies for account {}, skipping auto-promotion: {}",
                    account,
                    e
                );
            }
        }
    }

    let mut promoted = 0;
    for record in records {
        let Some(open) = open_by_account.get(&record.account) else {
            continue;
        };
        if open.contains(&record.supply_id) {
            continue;
        }
        if hanging_store::parse_orders(record).is_empty() {
            tracing::debug!(
                "Supply {} ({}) left assembling but is empty, leaving to cleanup",
                record.supply_id,
                record.account
            );
            continue;
        }

        match hanging_store::mark_fictitious_delivered(
            db,
            &record.supply_id,
            &record.account,
            OPERATOR_AUTO_SYSTEM,
        )
        .await
        {
            Ok(true) => {
                tracing::info!(
                    "Auto-promoted hanging supply {} ({}) to fictitious-delivered",
                    record.supply_id,
                    record.account
                );
                promoted += 1;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    "Auto-promotion failed for supply {} ({}): {}",
                    record.supply_id,
                    record.account,
                    e
                );
            }
        }
    }

    promoted
}
