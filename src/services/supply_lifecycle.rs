//! Supply lifecycle orchestration
//!
//! Top-level state machine coordinating order movement between supplies,
//! fictitious delivery of hanging supplies and fictitious quantity shipment.
//! There is no cross-system transaction: local Postgres, the WB marketplace
//! and the 1C reservation ledger are reconciled by sequencing (targets are
//! persisted before any order references them), per-item outcome
//! classification, and idempotent conflict-ignore logging. Any individual
//! order or account failing inside a fan-out never aborts its siblings.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use futures_util::future::join_all;
use sea_orm::DatabaseConnection;

use crate::models::order_status::OrderStatus;
use crate::models::orders::{CandidateOrder, WbOrder, WbSticker};
use crate::models::supplies::{
    DeliverFictitiousResponse, DeliverSuppliesRequest, DeliverSuppliesResponse,
    FictitiousDeliveryOutcome, MoveOrdersRequest, MoveOrdersResponse, ShipFictitiousRequest,
    ShipFictitiousResponse, ShippedOrderSticker, SupplyShipmentInfo,
};
use crate::services::final_store;
use crate::services::hanging_store::{self, ChangeLogEntry, ShippedOrderEntry};
use crate::services::onec_integration::OneCIntegration;
use crate::services::shipment_log::{self, ShipmentLogService};
use crate::services::status_ledger::{self, LedgerEntry};
use crate::services::status_validation::StatusValidationService;
use crate::services::supply_selection::{self, MoveDestination, WildCandidates};
use crate::services::wb_client::WbApiService;

/// Orchestrator failures that abort the whole call. Everything else is
/// absorbed into per-item outcome counters.
#[derive(Debug)]
pub enum LifecycleError {
    /// Malformed or empty request
    InvalidInput(String),
    /// Observed state contradicts recorded state; proceeding would corrupt
    DataIntegrity(String),
    /// The external system failed in a way that leaves nothing to do
    Upstream(String),
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            LifecycleError::DataIntegrity(msg) => write!(f, "Data integrity violation: {}", msg),
            LifecycleError::Upstream(msg) => write!(f, "Upstream failure: {}", msg),
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Order that failed pre-validation, with its block status
#[derive(Debug, Clone)]
struct BlockedOrder {
    order: CandidateOrder,
    status: OrderStatus,
}

/// Order whose marketplace move call failed
#[derive(Debug, Clone)]
struct FailedMove {
    order: CandidateOrder,
    reason: String,
}

fn to_candidate(order: &WbOrder, wild: &str, account: &str, supply_id: &str) -> CandidateOrder {
    CandidateOrder {
        order_id: order.id,
        nm_id: order.nm_id,
        wild: wild.to_string(),
        account: account.to_string(),
        supply_id: supply_id.to_string(),
        price: order.converted_price,
        created_at: order.created_at_parsed(),
    }
}

fn candidate_to_wb_order(candidate: &CandidateOrder) -> WbOrder {
    WbOrder {
        id: candidate.order_id,
        article: candidate.wild.clone(),
        nm_id: candidate.nm_id,
        converted_price: candidate.price,
        created_at: candidate.created_at.to_rfc3339(),
        supply_id: Some(candidate.supply_id.clone()),
    }
}

/// Groups confirmed orders into SupplyShipmentInfo entries keyed by the
/// supply id each order ships under (new supply for moved orders, original
/// supply for blocked-but-shipped ones).
fn group_for_shipment(orders: &[(&CandidateOrder, String)]) -> Vec<SupplyShipmentInfo> {
    let mut grouped: HashMap<(String, String), Vec<i64>> = HashMap::new();
    for (order, ship_under) in orders {
        grouped
            .entry((ship_under.clone(), order.account.clone()))
            .or_default()
            .push(order.order_id);
    }
    grouped
        .into_iter()
        .map(|((supply_id, account), order_ids)| SupplyShipmentInfo {
            supply_id,
            account,
            order_ids,
        })
        .collect()
}

#[derive(Clone)]
pub struct SupplyLifecycleService {
    db: DatabaseConnection,
    wb: WbApiService,
    validation: StatusValidationService,
    onec: OneCIntegration,
    shipment: ShipmentLogService,
}

impl SupplyLifecycleService {
    pub fn new(
        db: DatabaseConnection,
        wb: WbApiService,
        onec: OneCIntegration,
        shipment: ShipmentLogService,
    ) -> Self {
        let validation = StatusValidationService::new(wb.clone());
        Self {
            db,
            wb,
            validation,
            onec,
            shipment,
        }
    }

    // ------------------------------------------------------------------
    // Move orders between supplies
    // ------------------------------------------------------------------

    /// Moves orders out of their source supplies into final or hanging
    /// targets, per the request's per-wild remove counts.
    pub async fn move_orders(
        &self,
        request: &MoveOrdersRequest,
    ) -> Result<MoveOrdersResponse, LifecycleError> {
        if request.orders.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "orders map is empty".to_string(),
            ));
        }
        for (wild, group) in &request.orders {
            if group.supplies.iter().any(|s| s.order_ids.is_empty()) {
                return Err(LifecycleError::InvalidInput(format!(
                    "empty order_ids list for wild {}",
                    wild
                )));
            }
        }

        let destination = if request.move_to_final {
            MoveDestination::Final
        } else {
            MoveDestination::Hanging
        };
        let operator = request.operator.clone();

        // 1. Current marketplace orders per referenced supply, intersected
        // with the requested ids. A failed fetch degrades that supply to an
        // empty candidate pool.
        let (by_wild, source_supplies) = self.fetch_candidates(request).await;
        let processed_supplies = source_supplies.len();

        // 2. Deterministic selection per wild
        let selection = supply_selection::select_orders(by_wild, destination);
        let total_orders = selection.orders.len();
        let processed_wilds: HashSet<&str> =
            selection.orders.iter().map(|o| o.wild.as_str()).collect();
        let processed_wilds = processed_wilds.len();

        if selection.orders.is_empty() {
            tracing::warn!("Nothing selected to move, returning empty result");
            return Ok(MoveOrdersResponse {
                success: false,
                removed_order_ids: Vec::new(),
                processed_supplies,
                processed_wilds,
                total_orders: 0,
                successful_count: 0,
                invalid_status_count: 0,
                blocked_but_shipped_count: 0,
                failed_movement_count: 0,
                total_failed_count: 0,
            });
        }

        // 3. Create or reuse target supplies before anything references them
        let (targets, target_failures) = match destination {
            MoveDestination::Hanging => {
                self.create_hanging_targets(&selection.participating_pairs, operator.clone())
                    .await
            }
            MoveDestination::Final => {
                self.resolve_final_targets(&selection.participating_pairs, &selection.orders)
                    .await
            }
        };

        // 4. Pre-validate before any mutating call
        let mut account_orders: HashMap<String, HashSet<i64>> = HashMap::new();
        for order in &selection.orders {
            account_orders
                .entry(order.account.clone())
                .or_default()
                .insert(order.order_id);
        }
        let (eligible, blocked_statuses) = self.validation.validate_for_move(&account_orders).await;

        let mut invalid_status_orders: Vec<BlockedOrder> = Vec::new();
        let mut movable: Vec<&CandidateOrder> = Vec::new();
        for order in &selection.orders {
            if eligible.contains(&order.order_id) {
                movable.push(order);
            } else {
                let status = blocked_statuses
                    .get(&order.order_id)
                    .copied()
                    .unwrap_or(OrderStatus::BlockedInvalidStatus);
                invalid_status_orders.push(BlockedOrder {
                    order: order.clone(),
                    status,
                });
            }
        }

        // 5. Move the validated orders, one WB call per order, outcomes
        // classified independently
        let (moved, failed_movement) = self
            .execute_moves(&movable, &targets, &target_failures)
            .await;

        // 6/7/8/9. Destination-specific bookkeeping
        let response = match destination {
            MoveDestination::Hanging => {
                self.finish_hanging_move(
                    &moved,
                    &invalid_status_orders,
                    &failed_movement,
                    operator,
                    processed_supplies,
                    processed_wilds,
                    total_orders,
                )
                .await
            }
            MoveDestination::Final => {
                self.finish_final_move(
                    &moved,
                    &invalid_status_orders,
                    &failed_movement,
                    operator,
                    processed_supplies,
                    processed_wilds,
                    total_orders,
                )
                .await
            }
        };

        Ok(response)
    }

    /// Fans out over every (wild, supply) pair in the request and builds the
    /// candidate pools. Returns the pools plus the set of source supplies
    /// that answered.
    async fn fetch_candidates(
        &self,
        request: &MoveOrdersRequest,
    ) -> (HashMap<String, WildCandidates>, HashSet<(String, String)>) {
        let mut fetches = Vec::new();
        for (wild, group) in &request.orders {
            for selector in &group.supplies {
                let wb = self.wb.clone();
                let wild = wild.clone();
                let account = selector.account.clone();
                let supply_id = selector.supply_id.clone();
                let wanted: HashSet<i64> = selector.order_ids.iter().copied().collect();
                fetches.push(async move {
                    let result = wb.get_supply_orders(&account, &supply_id).await;
                    (wild, account, supply_id, wanted, result)
                });
            }
        }

        let mut by_wild: HashMap<String, WildCandidates> = HashMap::new();
        for (wild, group) in &request.orders {
            by_wild.insert(
                wild.clone(),
                WildCandidates {
                    remove_count: group.remove_count,
                    candidates: Vec::new(),
                },
            );
        }

        let mut source_supplies = HashSet::new();
        for (wild, account, supply_id, wanted, result) in join_all(fetches).await {
            match result {
                Ok(orders) => {
                    source_supplies.insert((supply_id.clone(), account.clone()));
                    let candidates: Vec<CandidateOrder> = orders
                        .iter()
                        .filter(|o| wanted.contains(&o.id))
                        .map(|o| to_candidate(o, &wild, &account, &supply_id))
                        .collect();
                    if candidates.len() < wanted.len() {
                        tracing::warn!(
                            "Supply {} ({}): {} of {} requested orders still present",
                            supply_id,
                            account,
                            candidates.len(),
                            wanted.len()
                        );
                    }
                    if let Some(pool) = by_wild.get_mut(&wild) {
                        pool.candidates.extend(candidates);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to fetch orders of supply {} ({}): {}",
                        supply_id,
                        account,
                        e
                    );
                }
            }
        }

        (by_wild, source_supplies)
    }

    /// Creates one fresh hanging supply per (wild, account) pair and persists
    /// the record (empty snapshot, tagged) before any order is added.
    async fn create_hanging_targets(
        &self,
        pairs: &HashSet<(String, String)>,
        operator: Option<String>,
    ) -> (HashMap<(String, String), String>, HashMap<(String, String), String>) {
        let today = Utc::now().format("%d.%m.%Y").to_string();
        let mut targets = HashMap::new();
        let mut failures = HashMap::new();

        let futures: Vec<_> = pairs
            .iter()
            .map(|(wild, account)| {
                let wb = self.wb.clone();
                let name = format!("{} ВИСЯЧАЯ {}", wild, today);
                let wild = wild.clone();
                let account = account.clone();
                async move {
                    let result = wb.create_supply(&account, &name).await;
                    (wild, account, result)
                }
            })
            .collect();

        for (wild, account, result) in join_all(futures).await {
            match result {
                Ok(supply_id) => {
                    match hanging_store::save(
                        &self.db,
                        &supply_id,
                        &account,
                        &[],
                        operator.clone(),
                        Some(hanging_store::SOURCE_CREATED_FOR_MOVE),
                    )
                    .await
                    {
                        Ok(()) => {
                            targets.insert((wild, account), supply_id);
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to persist hanging supply {} ({}): {}",
                                supply_id,
                                account,
                                e
                            );
                            failures.insert((wild, account), e.to_string());
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to create hanging supply for {} ({}): {}",
                        wild,
                        account,
                        e
                    );
                    failures.insert((wild, account), e.to_string());
                }
            }
        }

        (targets, failures)
    }

    /// Reuses the account's open final supply or creates a new one named
    /// after the source supply. Final targets are account-scoped; the
    /// returned map is still keyed by (wild, account) for uniform lookup.
    async fn resolve_final_targets(
        &self,
        pairs: &HashSet<(String, String)>,
        selected: &[CandidateOrder],
    ) -> (HashMap<(String, String), String>, HashMap<(String, String), String>) {
        let accounts: HashSet<&String> = pairs.iter().map(|(_, account)| account).collect();
        let mut per_account: HashMap<String, Result<String, String>> = HashMap::new();

        for account in accounts {
            let resolved = self.resolve_final_supply_for_account(account, selected).await;
            per_account.insert(account.clone(), resolved.map_err(|e| e.to_string()));
        }

        let mut targets = HashMap::new();
        let mut failures = HashMap::new();
        for (wild, account) in pairs {
            match per_account.get(account) {
                Some(Ok(supply_id)) => {
                    targets.insert((wild.clone(), account.clone()), supply_id.clone());
                }
                Some(Err(e)) => {
                    failures.insert((wild.clone(), account.clone()), e.clone());
                }
                None => {
                    failures.insert(
                        (wild.clone(), account.clone()),
                        "final supply resolution missing".to_string(),
                    );
                }
            }
        }

        (targets, failures)
    }

    async fn resolve_final_supply_for_account(
        &self,
        account: &str,
        selected: &[CandidateOrder],
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        // Reuse the recorded final supply while WB still reports it open
        if let Some(record) = final_store::get_latest(&self.db, account).await? {
            match self.wb.get_supply_info(account, &record.supply_id).await {
                Ok(info) if !info.done => {
                    tracing::info!(
                        "Reusing open final supply {} for account {}",
                        record.supply_id,
                        account
                    );
                    return Ok(record.supply_id);
                }
                Ok(_) => {
                    tracing::info!(
                        "Final supply {} for account {} is closed, creating a new one",
                        record.supply_id,
                        account
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not check final supply {} for account {}: {}",
                        record.supply_id,
                        account,
                        e
                    );
                }
            }
        }

        // Name the new final supply after the source supply of this account
        let source_supply = selected
            .iter()
            .find(|o| o.account == account)
            .map(|o| o.supply_id.clone());

        let name = match source_supply {
            Some(supply_id) => match self.wb.get_supply_info(account, &supply_id).await {
                Ok(info) => final_store::final_supply_name(&info.name),
                Err(e) => {
                    tracing::warn!("Could not fetch source supply name: {}", e);
                    final_store::final_supply_name(
                        &Utc::now().format("%d.%m.%Y").to_string(),
                    )
                }
            },
            None => final_store::final_supply_name(&Utc::now().format("%d.%m.%Y").to_string()),
        };

        let supply_id = self.wb.create_supply(account, &name).await?;
        final_store::save(&self.db, &supply_id, account, &name).await?;
        Ok(supply_id)
    }

    /// Adds each validated order to its target supply, one call per order in
    /// parallel, classifying every outcome independently.
    async fn execute_moves(
        &self,
        movable: &[&CandidateOrder],
        targets: &HashMap<(String, String), String>,
        target_failures: &HashMap<(String, String), String>,
    ) -> (Vec<(CandidateOrder, String)>, Vec<FailedMove>) {
        let mut moved = Vec::new();
        let mut failed = Vec::new();
        let mut calls = Vec::new();

        for order in movable {
            let key = (order.wild.clone(), order.account.clone());
            match targets.get(&key) {
                Some(target_supply) => {
                    let wb = self.wb.clone();
                    let order = (*order).clone();
                    let target_supply = target_supply.clone();
                    calls.push(async move {
                        let result = wb
                            .add_order_to_supply(&order.account, &target_supply, order.order_id)
                            .await;
                        (order, target_supply, result)
                    });
                }
                None => {
                    let reason = target_failures
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| "target supply unavailable".to_string());
                    failed.push(FailedMove {
                        order: (*order).clone(),
                        reason,
                    });
                }
            }
        }

        for (order, target_supply, result) in join_all(calls).await {
            match result {
                Ok(()) => {
                    tracing::info!(
                        "Order {} moved to supply {} ({})",
                        order.order_id,
                        target_supply,
                        order.account
                    );
                    moved.push((order, target_supply));
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to move order {} to supply {} ({}): {}",
                        order.order_id,
                        target_supply,
                        order.account,
                        e
                    );
                    failed.push(FailedMove {
                        order,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (moved, failed)
    }

    /// Hanging destination tail: reservation movement, snapshot update,
    /// ledger logging. Blocked/failed orders are simply left for a future
    /// cycle.
    #[allow(clippy::too_many_arguments)]
    async fn finish_hanging_move(
        &self,
        moved: &[(CandidateOrder, String)],
        invalid_status_orders: &[BlockedOrder],
        failed_movement: &[FailedMove],
        operator: Option<String>,
        processed_supplies: usize,
        processed_wilds: usize,
        total_orders: usize,
    ) -> MoveOrdersResponse {
        // Reservation with movement per (wild, account, old supply, new supply)
        let mut reservation_groups: HashMap<(String, String, String, String), i64> = HashMap::new();
        for (order, new_supply) in moved {
            *reservation_groups
                .entry((
                    order.wild.clone(),
                    order.account.clone(),
                    order.supply_id.clone(),
                    new_supply.clone(),
                ))
                .or_insert(0) += 1;
        }
        for ((wild, account, old_supply, new_supply), quantity) in reservation_groups {
            if let Err(e) = self
                .shipment
                .create_reservation_with_movement(&wild, &account, &new_supply, &old_supply, quantity)
                .await
            {
                tracing::error!(
                    "Reservation movement failed for {} ({} -> {}): {}",
                    wild,
                    old_supply,
                    new_supply,
                    e
                );
            }
        }

        // Refresh the hanging snapshots with the orders that actually moved
        let mut per_target: HashMap<(String, String), Vec<WbOrder>> = HashMap::new();
        for (order, new_supply) in moved {
            per_target
                .entry((new_supply.clone(), order.account.clone()))
                .or_default()
                .push(candidate_to_wb_order(order));
        }
        for ((supply_id, account), orders) in &per_target {
            if let Err(e) =
                hanging_store::update_order_data(&self.db, supply_id, account, orders).await
            {
                tracing::error!(
                    "Failed to update hanging snapshot {} ({}): {}",
                    supply_id,
                    account,
                    e
                );
            }
        }

        self.log_move_outcomes(
            moved,
            invalid_status_orders,
            failed_movement,
            OrderStatus::InHangingSupply,
            operator,
        )
        .await;

        let successful_count = moved.len();
        let invalid_status_count = invalid_status_orders.len();
        let failed_movement_count = failed_movement.len();

        MoveOrdersResponse {
            success: successful_count > 0,
            removed_order_ids: moved.iter().map(|(o, _)| o.order_id).collect(),
            processed_supplies,
            processed_wilds,
            total_orders,
            successful_count,
            invalid_status_count,
            blocked_but_shipped_count: 0,
            failed_movement_count,
            total_failed_count: invalid_status_count + failed_movement_count,
        }
    }

    /// Final destination tail: blocked orders ship under their original
    /// supply, reservations are released, the combined set goes to 1C and the
    /// shipment log, and every outcome lands in the ledger.
    #[allow(clippy::too_many_arguments)]
    async fn finish_final_move(
        &self,
        moved: &[(CandidateOrder, String)],
        invalid_status_orders: &[BlockedOrder],
        failed_movement: &[FailedMove],
        operator: Option<String>,
        processed_supplies: usize,
        processed_wilds: usize,
        total_orders: usize,
    ) -> MoveOrdersResponse {
        // The final round clears out pending stock regardless of block
        // status: blocked and move-failed orders ship under the supply they
        // physically sit in.
        let mut shipped_with_block: Vec<CandidateOrder> = Vec::new();
        shipped_with_block.extend(invalid_status_orders.iter().map(|b| b.order.clone()));
        shipped_with_block.extend(failed_movement.iter().map(|f| f.order.clone()));

        // Release reservations: everything leaves the warehouse now, grouped
        // by the supply the reservation was held against.
        let mut release_groups: HashMap<(String, String), i64> = HashMap::new();
        for (order, _) in moved {
            *release_groups
                .entry((order.supply_id.clone(), order.wild.clone()))
                .or_insert(0) += 1;
        }
        for order in &shipped_with_block {
            *release_groups
                .entry((order.supply_id.clone(), order.wild.clone()))
                .or_insert(0) += 1;
        }
        for ((supply_id, wild), quantity) in release_groups {
            if let Err(e) = self
                .shipment
                .release_reservation(&supply_id, &wild, quantity)
                .await
            {
                tracing::error!(
                    "Reservation release failed for supply {} ({}): {}",
                    supply_id,
                    wild,
                    e
                );
            }
        }

        // Combined set for 1C and the shipment log, grouped by the supply id
        // each order actually ships under
        let mut for_shipment: Vec<(&CandidateOrder, String)> = Vec::new();
        for (order, new_supply) in moved {
            for_shipment.push((order, new_supply.clone()));
        }
        for order in &shipped_with_block {
            for_shipment.push((order, order.supply_id.clone()));
        }

        let supplies = group_for_shipment(&for_shipment);
        let order_wild_map: HashMap<i64, String> = for_shipment
            .iter()
            .map(|(o, _)| (o.order_id, o.wild.clone()))
            .collect();

        let erp_response = self
            .onec
            .send_delivery(&self.db, &supplies, &order_wild_map)
            .await;
        let erp_ok = erp_response.is_success();
        if !erp_ok {
            tracing::error!(
                "1C rejected the delivery payload: status_code={} message={:?}",
                erp_response.status_code,
                erp_response.message
            );
        }

        let author = operator.clone().unwrap_or_else(|| "system".to_string());
        let rows = shipment_log::prepare_shipment_rows(&supplies, &order_wild_map, &author);
        if let Err(e) = self.shipment.save_shipments(&rows).await {
            tracing::error!("Shipment log save failed: {}", e);
        }

        self.log_move_outcomes(
            moved,
            invalid_status_orders,
            failed_movement,
            OrderStatus::InFinalSupply,
            operator.clone(),
        )
        .await;

        let mut removed_order_ids: Vec<i64> = moved.iter().map(|(o, _)| o.order_id).collect();

        if erp_ok {
            // Post-ERP statuses: the moved set is now with 1C, the blocked
            // set was dispatched under its original supply ids
            let mut entries: Vec<LedgerEntry> = Vec::new();
            for (order, new_supply) in moved {
                entries.push(
                    LedgerEntry::new(
                        order.order_id,
                        OrderStatus::SentTo1c,
                        Some(new_supply.clone()),
                        order.account.clone(),
                    )
                    .with_operator(operator.clone()),
                );
            }
            for order in &shipped_with_block {
                entries.push(
                    LedgerEntry::new(
                        order.order_id,
                        OrderStatus::ShippedWithBlock,
                        Some(order.supply_id.clone()),
                        order.account.clone(),
                    )
                    .with_operator(operator.clone()),
                );
            }
            if let Err(e) = status_ledger::insert_batch(&self.db, entries).await {
                tracing::error!("Failed to log post-ERP statuses: {}", e);
            }
            removed_order_ids.extend(shipped_with_block.iter().map(|o| o.order_id));
        }

        let successful_count = moved.len();
        let invalid_status_count = invalid_status_orders.len();
        let failed_movement_count = failed_movement.len();
        let blocked_but_shipped_count = if erp_ok { shipped_with_block.len() } else { 0 };

        MoveOrdersResponse {
            success: successful_count > 0 || blocked_but_shipped_count > 0,
            removed_order_ids,
            processed_supplies,
            processed_wilds,
            total_orders,
            successful_count,
            invalid_status_count,
            blocked_but_shipped_count,
            failed_movement_count,
            total_failed_count: invalid_status_count + failed_movement_count,
        }
    }

    /// Ledger entries shared by both destinations: destination status for
    /// moved orders, specific BLOCKED_* for pre-validation failures,
    /// BLOCKED_INVALID_STATUS for move-call failures.
    async fn log_move_outcomes(
        &self,
        moved: &[(CandidateOrder, String)],
        invalid_status_orders: &[BlockedOrder],
        failed_movement: &[FailedMove],
        destination_status: OrderStatus,
        operator: Option<String>,
    ) {
        let mut entries: Vec<LedgerEntry> = Vec::new();

        for (order, new_supply) in moved {
            entries.push(
                LedgerEntry::new(
                    order.order_id,
                    destination_status,
                    Some(new_supply.clone()),
                    order.account.clone(),
                )
                .with_operator(operator.clone()),
            );
        }
        for blocked in invalid_status_orders {
            entries.push(
                LedgerEntry::new(
                    blocked.order.order_id,
                    blocked.status,
                    Some(blocked.order.supply_id.clone()),
                    blocked.order.account.clone(),
                )
                .with_operator(operator.clone()),
            );
        }
        for failure in failed_movement {
            entries.push(
                LedgerEntry::new(
                    failure.order.order_id,
                    OrderStatus::BlockedInvalidStatus,
                    Some(failure.order.supply_id.clone()),
                    failure.order.account.clone(),
                )
                .with_operator(operator.clone()),
            );
        }

        if let Err(e) = status_ledger::insert_batch(&self.db, entries).await {
            tracing::error!("Failed to log move outcomes: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Fictitious delivery
    // ------------------------------------------------------------------

    /// Pushes one hanging supply into delivery and marks it fictitious.
    /// Safety check: the live marketplace order set is re-fetched; an empty
    /// live set is a hard abort, never a silent mark.
    pub async fn deliver_fictitious(
        &self,
        supply_id: &str,
        account: &str,
        operator: &str,
    ) -> Result<usize, LifecycleError> {
        let record = hanging_store::get(&self.db, supply_id, account)
            .await
            .map_err(|e| LifecycleError::Upstream(e.to_string()))?
            .ok_or_else(|| {
                LifecycleError::InvalidInput(format!(
                    "hanging supply {} ({}) is not registered",
                    supply_id, account
                ))
            })?;

        if record.is_fictitious_delivered {
            tracing::info!(
                "Hanging supply {} ({}) already fictitious-delivered, nothing to do",
                supply_id,
                account
            );
            return Ok(0);
        }

        let live_orders = self
            .wb
            .get_supply_orders(account, supply_id)
            .await
            .map_err(|e| LifecycleError::Upstream(e.to_string()))?;

        if live_orders.is_empty() {
            let snapshot_count = hanging_store::parse_orders(&record).len();
            return Err(LifecycleError::DataIntegrity(format!(
                "supply {} ({}) reports zero orders on the marketplace while the local snapshot has {}; refusing fictitious delivery",
                supply_id, account, snapshot_count
            )));
        }

        self.wb
            .deliver_supply(account, supply_id)
            .await
            .map_err(|e| LifecycleError::Upstream(e.to_string()))?;

        hanging_store::mark_fictitious_delivered(&self.db, supply_id, account, operator)
            .await
            .map_err(|e| LifecycleError::Upstream(e.to_string()))?;

        // Statuses are logged for the live set, not the cached snapshot
        let entries: Vec<LedgerEntry> = live_orders
            .iter()
            .map(|order| {
                LedgerEntry::new(
                    order.id,
                    OrderStatus::FictitiousDelivered,
                    Some(supply_id.to_string()),
                    account.to_string(),
                )
                .with_operator(Some(operator.to_string()))
            })
            .collect();
        let logged = entries.len();
        status_ledger::insert_batch(&self.db, entries)
            .await
            .map_err(|e| LifecycleError::Upstream(e.to_string()))?;

        // Reservation deliberately stays: the product has not physically
        // left the warehouse until the fictitious shipment step.
        Ok(logged)
    }

    /// Batch variant: every supply processed independently, per-item
    /// outcomes collected, the call itself never raises for one bad supply.
    pub async fn deliver_fictitious_batch(
        &self,
        supplies: &HashMap<String, String>,
        operator: &str,
    ) -> DeliverFictitiousResponse {
        let futures: Vec<_> = supplies
            .iter()
            .map(|(supply_id, account)| {
                let service = self.clone();
                let supply_id = supply_id.clone();
                let account = account.clone();
                let operator = operator.to_string();
                async move {
                    let result = service
                        .deliver_fictitious(&supply_id, &account, &operator)
                        .await;
                    (supply_id, account, result)
                }
            })
            .collect();

        let mut results = Vec::new();
        let mut successful_count = 0;
        for (supply_id, account, result) in join_all(futures).await {
            match result {
                Ok(orders_logged) => {
                    successful_count += 1;
                    results.push(FictitiousDeliveryOutcome {
                        supply_id,
                        account,
                        success: true,
                        error: None,
                        orders_logged,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        "Fictitious delivery failed for {} ({}): {}",
                        supply_id,
                        account,
                        e
                    );
                    results.push(FictitiousDeliveryOutcome {
                        supply_id,
                        account,
                        success: false,
                        error: Some(e.to_string()),
                        orders_logged: 0,
                    });
                }
            }
        }

        let total_processed = results.len();
        let failed_count = total_processed - successful_count;
        DeliverFictitiousResponse {
            success: failed_count == 0,
            total_processed,
            successful_count,
            failed_count,
            results,
        }
    }

    // ------------------------------------------------------------------
    // Fictitious shipment with quantity
    // ------------------------------------------------------------------

    /// Ships `shipped_quantity` orders out of the given hanging supplies:
    /// oldest first, never an order already in shipped_orders, only orders
    /// passing the shipment allowlist, and only orders WB returned a sticker
    /// for. Fewer available than requested clamps; zero available is an
    /// error.
    pub async fn ship_fictitious_quantity(
        &self,
        request: &ShipFictitiousRequest,
    ) -> Result<ShipFictitiousResponse, LifecycleError> {
        if request.supplies.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "supplies map is empty".to_string(),
            ));
        }
        if request.shipped_quantity == 0 {
            return Err(LifecycleError::InvalidInput(
                "shipped_quantity must be positive".to_string(),
            ));
        }

        // Pool of candidate orders across the supplies, minus the ones
        // already fictitiously shipped
        let (pool, live_by_supply) = self.collect_shipment_pool(&request.supplies).await;

        if pool.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "no orders available for fictitious shipment".to_string(),
            ));
        }

        // Shipment allowlist
        let mut account_orders: HashMap<String, HashSet<i64>> = HashMap::new();
        for order in &pool {
            account_orders
                .entry(order.account.clone())
                .or_default()
                .insert(order.order_id);
        }
        let eligible_ids = self.validation.filter_shipment_eligible(&account_orders).await;

        let mut eligible: Vec<CandidateOrder> = pool
            .into_iter()
            .filter(|o| eligible_ids.contains(&o.order_id))
            .collect();

        if eligible.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "no orders eligible for fictitious shipment".to_string(),
            ));
        }

        // FIFO across the whole pool
        eligible.sort_by_key(|o| (o.created_at, o.order_id));

        let clamped = eligible.len() < request.shipped_quantity;
        if clamped {
            tracing::warn!(
                "Requested {} orders but only {} eligible, clamping",
                request.shipped_quantity,
                eligible.len()
            );
        }
        let selected: Vec<CandidateOrder> = eligible
            .into_iter()
            .take(request.shipped_quantity)
            .collect();

        // Sticker gate: anything WB returns no sticker for is excluded from
        // this shipment (logged degradation, not a failure)
        let stickers = self.fetch_stickers_for(&selected).await;
        let committed: Vec<&CandidateOrder> = selected
            .iter()
            .filter(|o| {
                let has_sticker = stickers.contains_key(&o.order_id);
                if !has_sticker {
                    tracing::warn!(
                        "Order {} excluded from fictitious shipment: no sticker returned",
                        o.order_id
                    );
                }
                has_sticker
            })
            .collect();

        if committed.is_empty() {
            return Err(LifecycleError::Upstream(
                "sticker generation returned nothing; shipment aborted".to_string(),
            ));
        }

        self.commit_fictitious_shipment(&committed, &live_by_supply, &request.operator)
            .await;

        let sticker_payloads: Vec<ShippedOrderSticker> = committed
            .iter()
            .map(|order| {
                let sticker = &stickers[&order.order_id];
                ShippedOrderSticker {
                    order_id: order.order_id,
                    supply_id: order.supply_id.clone(),
                    account: order.account.clone(),
                    wild: order.wild.clone(),
                    file: sticker.file.clone(),
                    part_a: sticker.part_a,
                    part_b: sticker.part_b,
                    barcode: sticker.barcode.clone(),
                }
            })
            .collect();

        Ok(ShipFictitiousResponse {
            success: true,
            requested_quantity: request.shipped_quantity,
            shipped_count: committed.len(),
            clamped,
            stickers: sticker_payloads,
        })
    }

    /// Live orders of every requested hanging supply minus already-shipped
    /// ids. Also returns the full live sets for drain detection.
    async fn collect_shipment_pool(
        &self,
        supplies: &HashMap<String, String>,
    ) -> (Vec<CandidateOrder>, HashMap<(String, String), Vec<i64>>) {
        let futures: Vec<_> = supplies
            .iter()
            .map(|(supply_id, account)| {
                let service = self.clone();
                let supply_id = supply_id.clone();
                let account = account.clone();
                async move {
                    let record = hanging_store::get(&service.db, &supply_id, &account).await;
                    let live = service.wb.get_supply_orders(&account, &supply_id).await;
                    (supply_id, account, record, live)
                }
            })
            .collect();

        let mut pool = Vec::new();
        let mut live_by_supply = HashMap::new();

        for (supply_id, account, record, live) in join_all(futures).await {
            let record = match record {
                Ok(Some(r)) => r,
                Ok(None) => {
                    tracing::warn!(
                        "Supply {} ({}) is not a registered hanging supply, skipping",
                        supply_id,
                        account
                    );
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to load hanging supply {} ({}): {}",
                        supply_id,
                        account,
                        e
                    );
                    continue;
                }
            };

            let live = match live {
                Ok(orders) => orders,
                Err(e) => {
                    tracing::error!(
                        "Failed to fetch live orders of {} ({}): {}",
                        supply_id,
                        account,
                        e
                    );
                    continue;
                }
            };

            let shipped: HashSet<i64> = hanging_store::parse_shipped(&record)
                .into_iter()
                .map(|s| s.order_id)
                .collect();

            live_by_supply.insert(
                (supply_id.clone(), account.clone()),
                live.iter().map(|o| o.id).collect(),
            );

            for order in &live {
                if shipped.contains(&order.id) {
                    continue;
                }
                let wild = crate::services::article_codes::normalize_vendor_code(&order.article);
                pool.push(to_candidate(order, &wild, &account, &supply_id));
            }
        }

        (pool, live_by_supply)
    }

    async fn fetch_stickers_for(
        &self,
        selected: &[CandidateOrder],
    ) -> HashMap<i64, WbSticker> {
        let mut per_account: HashMap<String, Vec<i64>> = HashMap::new();
        for order in selected {
            per_account
                .entry(order.account.clone())
                .or_default()
                .push(order.order_id);
        }

        let futures: Vec<_> = per_account
            .into_iter()
            .map(|(account, ids)| {
                let wb = self.wb.clone();
                async move {
                    let result = wb.get_stickers(&account, &ids).await;
                    (account, result)
                }
            })
            .collect();

        let mut stickers = HashMap::new();
        for (account, result) in join_all(futures).await {
            match result {
                Ok(fetched) => {
                    for sticker in fetched {
                        stickers.insert(sticker.order_id, sticker);
                    }
                }
                Err(e) => {
                    tracing::error!("Sticker fetch failed for account {}: {}", account, e);
                }
            }
        }
        stickers
    }

    /// Commits the sticker-confirmed subset: shipment log, 1C, reservation
    /// release, shipped_orders records and ledger entries. Every step is
    /// absorbed individually; a failed side channel is logged, not fatal.
    async fn commit_fictitious_shipment(
        &self,
        committed: &[&CandidateOrder],
        live_by_supply: &HashMap<(String, String), Vec<i64>>,
        operator: &str,
    ) {
        let with_supply: Vec<(&CandidateOrder, String)> = committed
            .iter()
            .map(|o| (*o, o.supply_id.clone()))
            .collect();
        let supplies = group_for_shipment(&with_supply);
        let order_wild_map: HashMap<i64, String> = committed
            .iter()
            .map(|o| (o.order_id, o.wild.clone()))
            .collect();

        let rows = shipment_log::prepare_shipment_rows(&supplies, &order_wild_map, operator);
        if let Err(e) = self.shipment.save_shipments(&rows).await {
            tracing::error!("Shipment log save failed: {}", e);
        }

        let erp_response = self
            .onec
            .send_delivery(&self.db, &supplies, &order_wild_map)
            .await;
        if !erp_response.is_success() {
            tracing::error!(
                "1C rejected the fictitious shipment payload: status_code={} message={:?}",
                erp_response.status_code,
                erp_response.message
            );
        }

        // Release the reservations: the product physically leaves now
        let mut release_groups: HashMap<(String, String), i64> = HashMap::new();
        for order in committed {
            *release_groups
                .entry((order.supply_id.clone(), order.wild.clone()))
                .or_insert(0) += 1;
        }
        for ((supply_id, wild), quantity) in release_groups {
            if let Err(e) = self
                .shipment
                .release_reservation(&supply_id, &wild, quantity)
                .await
            {
                tracing::error!(
                    "Reservation release failed for supply {} ({}): {}",
                    supply_id,
                    wild,
                    e
                );
            }
        }

        // Record the dispatches per supply and log terminal statuses
        let shipped_at = Utc::now().to_rfc3339();
        let mut per_supply: HashMap<(String, String), Vec<i64>> = HashMap::new();
        for order in committed {
            per_supply
                .entry((order.supply_id.clone(), order.account.clone()))
                .or_default()
                .push(order.order_id);
        }

        let mut entries: Vec<LedgerEntry> = Vec::new();
        for ((supply_id, account), order_ids) in &per_supply {
            let shipped_entries: Vec<ShippedOrderEntry> = order_ids
                .iter()
                .map(|order_id| ShippedOrderEntry {
                    order_id: *order_id,
                    shipped_at: shipped_at.clone(),
                    operator: operator.to_string(),
                })
                .collect();
            if let Err(e) =
                hanging_store::append_shipped_orders(&self.db, supply_id, account, &shipped_entries)
                    .await
            {
                tracing::error!(
                    "Failed to record shipped orders for {} ({}): {}",
                    supply_id,
                    account,
                    e
                );
            }

            // A call that drains every remaining live order of the supply is
            // its terminal fictitious delivery; anything less is partial.
            let drained = match (
                live_by_supply.get(&(supply_id.clone(), account.clone())),
                hanging_store::get(&self.db, supply_id, account).await,
            ) {
                (Some(live_ids), Ok(Some(record))) => {
                    let shipped: HashSet<i64> = hanging_store::parse_shipped(&record)
                        .into_iter()
                        .map(|s| s.order_id)
                        .collect();
                    live_ids.iter().all(|id| shipped.contains(id))
                }
                _ => false,
            };
            let status = if drained {
                OrderStatus::FictitiousDelivered
            } else {
                OrderStatus::PartiallyShipped
            };

            for order_id in order_ids {
                entries.push(
                    LedgerEntry::new(
                        *order_id,
                        status,
                        Some(supply_id.clone()),
                        account.clone(),
                    )
                    .with_operator(Some(operator.to_string())),
                );
            }
        }

        if let Err(e) = status_ledger::insert_batch(&self.db, entries).await {
            tracing::error!("Failed to log fictitious shipment statuses: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Real dispatch of assembled supplies
    // ------------------------------------------------------------------

    /// Dispatches assembled supplies for real: WB delivery, shipment log,
    /// 1C notification, DELIVERED/SENT_TO_1C ledger entries. The request's
    /// order lists are cross-checked against the ledger and any divergence
    /// is logged before only the requested ids are marked.
    pub async fn deliver_supplies(
        &self,
        request: &DeliverSuppliesRequest,
    ) -> Result<DeliverSuppliesResponse, LifecycleError> {
        if request.supplies.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "supplies list is empty".to_string(),
            ));
        }

        let futures: Vec<_> = request
            .supplies
            .iter()
            .map(|supply| {
                let wb = self.wb.clone();
                let supply_id = supply.supply_id.clone();
                let account = supply.account.clone();
                async move {
                    let result = wb.deliver_supply(&account, &supply_id).await;
                    (supply_id, account, result)
                }
            })
            .collect();

        let mut delivered = 0;
        for (supply_id, account, result) in join_all(futures).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(
                    "Failed to deliver supply {} ({}): {}",
                    supply_id,
                    account,
                    e
                ),
            }
        }

        // Cross-check against the recorded history
        let pairs: Vec<(String, String)> = request
            .supplies
            .iter()
            .map(|s| (s.supply_id.clone(), s.account.clone()))
            .collect();
        if let Ok(from_ledger) = status_ledger::get_order_ids_by_supplies(&self.db, &pairs).await {
            let mut by_supply: HashMap<&str, HashSet<i64>> = HashMap::new();
            for (order_id, supply_id) in &from_ledger {
                by_supply.entry(supply_id.as_str()).or_default().insert(*order_id);
            }
            for supply in &request.supplies {
                let requested: HashSet<i64> = supply.order_ids.iter().copied().collect();
                if let Some(recorded) = by_supply.get(supply.supply_id.as_str()) {
                    let missing: Vec<i64> =
                        recorded.difference(&requested).copied().collect();
                    if !missing.is_empty() {
                        tracing::warn!(
                            "Supply {} ({}): {} recorded orders will NOT be marked DELIVERED: {:?}",
                            supply.supply_id,
                            supply.account,
                            missing.len(),
                            missing
                        );
                    }
                }
            }
        }

        let rows = shipment_log::prepare_shipment_rows(
            &request.supplies,
            &request.order_wild_map,
            &request.operator,
        );
        if let Err(e) = self.shipment.save_shipments(&rows).await {
            tracing::error!("Shipment log save failed: {}", e);
        }

        let erp_response = self
            .onec
            .send_delivery(&self.db, &request.supplies, &request.order_wild_map)
            .await;

        let mut entries: Vec<LedgerEntry> = Vec::new();
        for supply in &request.supplies {
            for order_id in &supply.order_ids {
                if erp_response.is_success() {
                    entries.push(
                        LedgerEntry::new(
                            *order_id,
                            OrderStatus::SentTo1c,
                            Some(supply.supply_id.clone()),
                            supply.account.clone(),
                        )
                        .with_operator(Some(request.operator.clone())),
                    );
                }
                entries.push(
                    LedgerEntry::new(
                        *order_id,
                        OrderStatus::Delivered,
                        Some(supply.supply_id.clone()),
                        supply.account.clone(),
                    )
                    .with_operator(Some(request.operator.clone())),
                );
            }
        }
        let logged = entries.len();
        if let Err(e) = status_ledger::insert_batch(&self.db, entries).await {
            tracing::error!("Failed to log delivery statuses: {}", e);
        }

        Ok(DeliverSuppliesResponse {
            success: delivered > 0,
            delivered_supplies: delivered,
            logged_orders: logged,
        })
    }

    // ------------------------------------------------------------------
    // Reconciliation entry points (used by the background job)
    // ------------------------------------------------------------------

    /// Diffs one hanging record against the marketplace and appends the
    /// changes under the given sync session, then overwrites the snapshot
    /// (the empty list included: it means the supply was drained externally).
    pub async fn reconcile_hanging_supply(
        &self,
        record: &crate::entities::hanging_supplies::Model,
        sync_session: &str,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let snapshot = hanging_store::parse_orders(record);
        let snapshot_ids: HashSet<i64> = snapshot.iter().map(|o| o.id).collect();

        let live = self
            .wb
            .get_supply_orders(&record.account, &record.supply_id)
            .await?;
        let live_ids: HashSet<i64> = live.iter().map(|o| o.id).collect();

        let removed: Vec<i64> = snapshot_ids.difference(&live_ids).copied().collect();
        let added: Vec<i64> = live_ids.difference(&snapshot_ids).copied().collect();

        if removed.is_empty() && added.is_empty() {
            return Ok(0);
        }

        let timestamp = Utc::now().to_rfc3339();
        let mut entries: Vec<ChangeLogEntry> = Vec::new();
        for order_id in &removed {
            if let Some(order) = snapshot.iter().find(|o| o.id == *order_id) {
                entries.push(ChangeLogEntry {
                    timestamp: timestamp.clone(),
                    change_type: "removed".to_string(),
                    order_id: *order_id,
                    order_data: serde_json::to_value(order)?,
                    sync_session: sync_session.to_string(),
                });
            }
        }
        for order_id in &added {
            if let Some(order) = live.iter().find(|o| o.id == *order_id) {
                entries.push(ChangeLogEntry {
                    timestamp: timestamp.clone(),
                    change_type: "added".to_string(),
                    order_id: *order_id,
                    order_data: serde_json::to_value(order)?,
                    sync_session: sync_session.to_string(),
                });
            }
        }

        let changes = entries.len();
        hanging_store::append_changes_log(&self.db, &record.supply_id, &record.account, &entries)
            .await?;
        hanging_store::update_order_data(&self.db, &record.supply_id, &record.account, &live)
            .await?;

        tracing::info!(
            "Supply {} ({}): +{} -{} orders reconciled",
            record.supply_id,
            record.account,
            added.len(),
            removed.len()
        );
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(order_id: i64, account: &str, supply_id: &str, wild: &str) -> CandidateOrder {
        CandidateOrder {
            order_id,
            nm_id: 1000 + order_id,
            wild: wild.to_string(),
            account: account.to_string(),
            supply_id: supply_id.to_string(),
            price: 123456,
            created_at: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_group_for_shipment_splits_by_supply_and_account() {
        let a = candidate(1, "acc1", "S1", "wild5");
        let b = candidate(2, "acc1", "S1", "wild5");
        let c = candidate(3, "acc2", "S2", "wild9");

        let orders = vec![
            (&a, "NEW-1".to_string()),
            (&b, "NEW-1".to_string()),
            (&c, "S2".to_string()),
        ];
        let mut grouped = group_for_shipment(&orders);
        grouped.sort_by(|x, y| x.supply_id.cmp(&y.supply_id));

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].supply_id, "NEW-1");
        assert_eq!(grouped[0].account, "acc1");
        assert_eq!(grouped[0].order_ids.len(), 2);
        assert_eq!(grouped[1].supply_id, "S2");
        assert_eq!(grouped[1].order_ids, vec![3]);
    }

    #[test]
    fn test_candidate_round_trip_keeps_identity() {
        let original = candidate(42, "acc1", "S1", "wild7");
        let as_wb = candidate_to_wb_order(&original);
        assert_eq!(as_wb.id, 42);
        assert_eq!(as_wb.article, "wild7");
        assert_eq!(as_wb.converted_price, 123456);

        let back = to_candidate(&as_wb, "wild7", "acc1", "S1");
        assert_eq!(back.order_id, original.order_id);
        assert_eq!(back.created_at, original.created_at);
    }

    #[test]
    fn test_lifecycle_error_display_carries_category() {
        let e = LifecycleError::DataIntegrity("empty live set".to_string());
        assert!(e.to_string().contains("Data integrity"));
        let e = LifecycleError::InvalidInput("empty".to_string());
        assert!(e.to_string().contains("Invalid input"));
    }
}
