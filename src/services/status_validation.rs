//! Order status validation against the marketplace
//!
//! Classifies orders as movable/shippable before any mutating WB call is
//! spent on them. Two policies live here and are NOT interchangeable:
//!
//! - move eligibility blocks known-bad supplier statuses (an order skipped by
//!   mistake is just delayed a cycle);
//! - shipment eligibility allow-lists exactly complete+waiting (physically
//!   shipping an unconfirmed order risks double shipment).

use std::collections::{HashMap, HashSet};

use futures_util::future::join_all;

use crate::models::order_status::OrderStatus;
use crate::models::orders::OrderStatusPair;
use crate::services::wb_client::WbApiService;

/// Outcome of the move pre-validation for one order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveEligibility {
    Eligible,
    Blocked(OrderStatus),
}

/// Movable iff WB still reports the order as assembling (new/confirm).
/// complete/cancel map to their specific block reasons; everything else,
/// including the lookup-failure placeholder, blocks as invalid status.
pub fn classify_move(status: &OrderStatusPair) -> MoveEligibility {
    match status.supplier_status.as_str() {
        "new" | "confirm" => MoveEligibility::Eligible,
        other => MoveEligibility::Blocked(OrderStatus::from_blocked_supplier_status(other)),
    }
}

/// Shippable iff WB confirmed assembly AND the order still waits for handover.
/// Strict allowlist; any other observed pair is rejected.
pub fn is_shipment_eligible(status: &OrderStatusPair) -> bool {
    status.supplier_status == "complete" && status.wb_status == "waiting"
}

#[derive(Clone)]
pub struct StatusValidationService {
    wb: WbApiService,
}

impl StatusValidationService {
    pub fn new(wb: WbApiService) -> Self {
        Self { wb }
    }

    /// Fetches (supplierStatus, wbStatus) for every order, fanning out per
    /// account. A failed account lookup degrades that whole account to the
    /// `error/error` placeholder instead of raising, so one broken cabinet
    /// never stalls the batch for the others.
    pub async fn fetch_statuses(
        &self,
        account_orders: &HashMap<String, HashSet<i64>>,
    ) -> HashMap<i64, OrderStatusPair> {
        let futures: Vec<_> = account_orders
            .iter()
            .map(|(account, order_ids)| {
                let wb = self.wb.clone();
                let account = account.clone();
                let ids: Vec<i64> = order_ids.iter().copied().collect();
                async move {
                    let result = wb.get_order_statuses(&account, &ids).await;
                    (account, ids, result)
                }
            })
            .collect();

        let mut statuses = HashMap::new();
        for (account, ids, result) in join_all(futures).await {
            match result {
                Ok(fetched) => {
                    for id in ids {
                        // Ids WB did not echo back get the placeholder too
                        let pair = fetched
                            .get(&id)
                            .cloned()
                            .unwrap_or_else(OrderStatusPair::lookup_error);
                        statuses.insert(id, pair);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Status lookup failed for account {} ({} orders): {}",
                        account,
                        ids.len(),
                        e
                    );
                    for id in ids {
                        statuses.insert(id, OrderStatusPair::lookup_error());
                    }
                }
            }
        }

        statuses
    }

    /// Pre-validates a set of orders for movement: returns (eligible ids,
    /// blocked id -> block status).
    pub async fn validate_for_move(
        &self,
        account_orders: &HashMap<String, HashSet<i64>>,
    ) -> (HashSet<i64>, HashMap<i64, OrderStatus>) {
        let statuses = self.fetch_statuses(account_orders).await;

        let mut eligible = HashSet::new();
        let mut blocked = HashMap::new();

        for (order_id, pair) in &statuses {
            match classify_move(pair) {
                MoveEligibility::Eligible => {
                    eligible.insert(*order_id);
                }
                MoveEligibility::Blocked(status) => {
                    tracing::info!(
                        "Order {} blocked for move: supplierStatus={}, wbStatus={} -> {}",
                        order_id,
                        pair.supplier_status,
                        pair.wb_status,
                        status
                    );
                    blocked.insert(*order_id, status);
                }
            }
        }

        (eligible, blocked)
    }

    /// Filters orders through the shipment allowlist; ineligible orders are
    /// logged with the exact observed pair for audit.
    pub async fn filter_shipment_eligible(
        &self,
        account_orders: &HashMap<String, HashSet<i64>>,
    ) -> HashSet<i64> {
        let statuses = self.fetch_statuses(account_orders).await;

        let mut eligible = HashSet::new();
        for (order_id, pair) in &statuses {
            if is_shipment_eligible(pair) {
                eligible.insert(*order_id);
            } else {
                tracing::info!(
                    "Order {} not eligible for fictitious shipment: supplierStatus={}, wbStatus={}",
                    order_id,
                    pair.supplier_status,
                    pair.wb_status
                );
            }
        }

        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_policy_allows_assembling_orders() {
        assert_eq!(
            classify_move(&OrderStatusPair::new("new", "waiting")),
            MoveEligibility::Eligible
        );
        assert_eq!(
            classify_move(&OrderStatusPair::new("confirm", "waiting")),
            MoveEligibility::Eligible
        );
    }

    #[test]
    fn test_move_policy_blocks_terminal_statuses() {
        assert_eq!(
            classify_move(&OrderStatusPair::new("complete", "sold")),
            MoveEligibility::Blocked(OrderStatus::BlockedAlreadyDelivered)
        );
        assert_eq!(
            classify_move(&OrderStatusPair::new("cancel", "canceled")),
            MoveEligibility::Blocked(OrderStatus::BlockedCanceled)
        );
    }

    #[test]
    fn test_move_policy_blocks_unknown_and_error_placeholder() {
        assert_eq!(
            classify_move(&OrderStatusPair::lookup_error()),
            MoveEligibility::Blocked(OrderStatus::BlockedInvalidStatus)
        );
        assert_eq!(
            classify_move(&OrderStatusPair::new("something_else", "waiting")),
            MoveEligibility::Blocked(OrderStatus::BlockedInvalidStatus)
        );
    }

    #[test]
    fn test_shipment_allowlist_is_narrower_than_move_blocklist() {
        // new/sold is movable but NOT shippable
        let pair = OrderStatusPair::new("new", "sold");
        assert_eq!(classify_move(&pair), MoveEligibility::Eligible);
        assert!(!is_shipment_eligible(&pair));

        // complete/waiting is shippable but NOT movable
        let pair = OrderStatusPair::new("complete", "waiting");
        assert!(is_shipment_eligible(&pair));
        assert_eq!(
            classify_move(&pair),
            MoveEligibility::Blocked(OrderStatus::BlockedAlreadyDelivered)
        );
    }

    #[test]
    fn test_shipment_allowlist_rejects_near_misses() {
        assert!(!is_shipment_eligible(&OrderStatusPair::new(
            "complete", "sold"
        )));
        assert!(!is_shipment_eligible(&OrderStatusPair::new(
            "confirm", "waiting"
        )));
        assert!(!is_shipment_eligible(&OrderStatusPair::lookup_error()));
    }
}
