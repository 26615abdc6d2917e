//! Order selection for supply movement
//!
//! Given per-wild candidate pools and remove counts, picks the concrete
//! orders to move. Final-bound moves clear the oldest backlog first (FIFO);
//! hanging-bound moves take the newest orders so older ones get more cycles
//! to become naturally eligible.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::models::orders::CandidateOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDestination {
    Final,
    Hanging,
}

/// Candidate pool for one wild code
#[derive(Debug, Clone)]
pub struct WildCandidates {
    pub remove_count: usize,
    pub candidates: Vec<CandidateOrder>,
}

/// Result of a selection pass
#[derive(Debug, Clone)]
pub struct Selection {
    pub orders: Vec<CandidateOrder>,
    /// (wild, account) pairs that contributed at least one order; a target
    /// supply is created per pair
    pub participating_pairs: HashSet<(String, String)>,
}

/// Deterministically selects orders per wild honoring remove_count.
///
/// Wilds with remove_count == 0 are skipped outright (no target supply gets
/// created for them). A remove_count larger than the pool clamps to the pool
/// with a logged shortfall, never an error.
pub fn select_orders(
    by_wild: HashMap<String, WildCandidates>,
    destination: MoveDestination,
) -> Selection {
    let mut selected = Vec::new();
    let mut participating_pairs = HashSet::new();

    for (wild, group) in by_wild {
        if group.remove_count == 0 {
            tracing::debug!("Wild {}: remove_count is 0, skipping", wild);
            continue;
        }

        let mut candidates = group.candidates;
        match destination {
            MoveDestination::Final => {
                candidates.sort_by_key(|o| (o.created_at, o.order_id));
            }
            MoveDestination::Hanging => {
                candidates.sort_by_key(|o| (Reverse(o.created_at), o.order_id));
            }
        }

        if group.remove_count > candidates.len() {
            tracing::warn!(
                "Wild {}: requested {} orders but only {} available, clamping",
                wild,
                group.remove_count,
                candidates.len()
            );
        }

        for order in candidates.into_iter().take(group.remove_count) {
            participating_pairs.insert((order.wild.clone(), order.account.clone()));
            selected.push(order);
        }
    }

    Selection {
        orders: selected,
        participating_pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(order_id: i64, minute: u32) -> CandidateOrder {
        CandidateOrder {
            order_id,
            nm_id: 100 + order_id,
            wild: "wild5".to_string(),
            account: "acc1".to_string(),
            supply_id: "WB-GI-1".to_string(),
            price: 1000,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
        }
    }

    fn pool(remove_count: usize, candidates: Vec<CandidateOrder>) -> HashMap<String, WildCandidates> {
        HashMap::from([(
            "wild5".to_string(),
            WildCandidates {
                remove_count,
                candidates,
            },
        )])
    }

    #[test]
    fn test_final_takes_oldest_first() {
        let selection = select_orders(
            pool(2, vec![candidate(3, 30), candidate(1, 0), candidate(2, 15)]),
            MoveDestination::Final,
        );
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_hanging_takes_newest_first() {
        let selection = select_orders(
            pool(2, vec![candidate(3, 30), candidate(1, 0), candidate(2, 15)]),
            MoveDestination::Hanging,
        );
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_tie_break_by_order_id() {
        let selection = select_orders(
            pool(2, vec![candidate(9, 10), candidate(4, 10), candidate(7, 10)]),
            MoveDestination::Final,
        );
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![4, 7]);

        let selection = select_orders(
            pool(2, vec![candidate(9, 10), candidate(4, 10), candidate(7, 10)]),
            MoveDestination::Hanging,
        );
        let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![4, 7]);
    }

    #[test]
    fn test_clamps_to_available() {
        let selection = select_orders(
            pool(10, vec![candidate(1, 0), candidate(2, 5)]),
            MoveDestination::Final,
        );
        assert_eq!(selection.orders.len(), 2);
    }

    #[test]
    fn test_zero_remove_count_skips_wild() {
        let selection = select_orders(
            pool(0, vec![candidate(1, 0), candidate(2, 5)]),
            MoveDestination::Final,
        );
        assert!(selection.orders.is_empty());
        assert!(selection.participating_pairs.is_empty());
    }

    #[test]
    fn test_participating_pairs_cover_selected_accounts_only() {
        let mut other = candidate(5, 20);
        other.account = "acc2".to_string();

        let selection = select_orders(
            pool(1, vec![candidate(1, 0), other]),
            MoveDestination::Hanging,
        );
        // newest is order 5 from acc2; only that pair participates
        assert_eq!(selection.orders.len(), 1);
        assert_eq!(selection.orders[0].order_id, 5);
        assert_eq!(
            selection.participating_pairs,
            HashSet::from([("wild5".to_string(), "acc2".to_string())])
        );
    }
}
