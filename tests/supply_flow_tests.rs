//! Contract tests for the supply movement flow: selection ordering, the two
//! status policies, and the wire shapes of the inbound endpoints.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use serde_json::json;

use supplyhub_backend::models::order_status::OrderStatus;
use supplyhub_backend::models::orders::{CandidateOrder, OrderStatusPair};
use supplyhub_backend::models::supplies::{MoveOrdersRequest, MoveOrdersResponse};
use supplyhub_backend::services::article_codes::normalize_vendor_code;
use supplyhub_backend::services::final_store::final_supply_name;
use supplyhub_backend::services::status_validation::{
    classify_move, is_shipment_eligible, MoveEligibility,
};
use supplyhub_backend::services::supply_selection::{
    select_orders, MoveDestination, WildCandidates,
};

fn candidate(order_id: i64, hour: u32, minute: u32) -> CandidateOrder {
    CandidateOrder {
        order_id,
        nm_id: 500 + order_id,
        wild: "wild5".to_string(),
        account: "acc1".to_string(),
        supply_id: "WB-GI-100".to_string(),
        price: 149900,
        created_at: Utc.with_ymd_and_hms(2026, 4, 2, hour, minute, 0).unwrap(),
    }
}

/// Oldest-first for final destinations, newest-first for hanging ones, over
/// the same candidate set.
#[test]
fn selection_ordering_depends_on_destination() {
    let make_pool = || {
        HashMap::from([(
            "wild5".to_string(),
            WildCandidates {
                remove_count: 2,
                candidates: vec![candidate(1, 10, 0), candidate(2, 10, 5), candidate(3, 10, 10)],
            },
        )])
    };

    let to_final = select_orders(make_pool(), MoveDestination::Final);
    let final_ids: Vec<i64> = to_final.orders.iter().map(|o| o.order_id).collect();
    assert_eq!(final_ids, vec![1, 2]);

    let to_hanging = select_orders(make_pool(), MoveDestination::Hanging);
    let hanging_ids: Vec<i64> = to_hanging.orders.iter().map(|o| o.order_id).collect();
    assert_eq!(hanging_ids, vec![3, 2]);
}

/// An order WB reports as new/sold is movable but must not pass the
/// shipment allowlist; complete/waiting is the exact opposite.
#[test]
fn move_blocklist_and_shipment_allowlist_diverge() {
    let new_sold = OrderStatusPair::new("new", "sold");
    assert_eq!(classify_move(&new_sold), MoveEligibility::Eligible);
    assert!(!is_shipment_eligible(&new_sold));

    let complete_waiting = OrderStatusPair::new("complete", "waiting");
    assert!(is_shipment_eligible(&complete_waiting));
    assert_eq!(
        classify_move(&complete_waiting),
        MoveEligibility::Blocked(OrderStatus::BlockedAlreadyDelivered)
    );
}

/// The account-wide lookup failure placeholder blocks movement with the
/// generic invalid-status reason, never a panic or a pass-through.
#[test]
fn lookup_failure_degrades_to_blocked() {
    let placeholder = OrderStatusPair::lookup_error();
    assert_eq!(
        classify_move(&placeholder),
        MoveEligibility::Blocked(OrderStatus::BlockedInvalidStatus)
    );
    assert!(!is_shipment_eligible(&placeholder));
}

/// moveOrders request body as the routing layer sends it
#[test]
fn move_orders_request_parses_wire_format() {
    let body = json!({
        "operation_id": "op-42",
        "orders": {
            "wild5": {
                "supplies": [
                    {"account": "acc1", "supply_id": "WB-GI-100", "order_ids": [1, 2]}
                ],
                "remove_count": 1
            }
        },
        "move_to_final": false,
        "operator": "ivanov"
    });

    let request: MoveOrdersRequest = serde_json::from_value(body).unwrap();
    assert_eq!(request.operation_id.as_deref(), Some("op-42"));
    assert!(!request.move_to_final);
    let group = &request.orders["wild5"];
    assert_eq!(group.remove_count, 1);
    assert_eq!(group.supplies[0].order_ids, vec![1, 2]);
}

/// The response keeps the summary-count contract: per-category counters,
/// never per-order detail.
#[test]
fn move_orders_response_exposes_counters() {
    let response = MoveOrdersResponse {
        success: true,
        removed_order_ids: vec![2],
        processed_supplies: 1,
        processed_wilds: 1,
        total_orders: 1,
        successful_count: 1,
        invalid_status_count: 0,
        blocked_but_shipped_count: 0,
        failed_movement_count: 0,
        total_failed_count: 0,
    };

    let value = serde_json::to_value(&response).unwrap();
    for key in [
        "success",
        "removed_order_ids",
        "processed_supplies",
        "processed_wilds",
        "total_orders",
        "successful_count",
        "invalid_status_count",
        "blocked_but_shipped_count",
        "failed_movement_count",
        "total_failed_count",
    ] {
        assert!(value.get(key).is_some(), "missing field {}", key);
    }
}

#[test]
fn vendor_codes_and_final_names_normalize() {
    assert_eq!(normalize_vendor_code("wild273_синий_XL"), "wild273");
    assert_eq!(normalize_vendor_code("samples"), "samples");
    assert_eq!(final_supply_name("2 круг 14.07._ТЕХ"), "2 круг 14.07._ФИНАЛ");
}

/// Ledger statuses survive the string round trip the journal table stores
#[test]
fn order_statuses_round_trip_through_strings() {
    for status in [
        OrderStatus::InHangingSupply,
        OrderStatus::ShippedWithBlock,
        OrderStatus::FictitiousDelivered,
    ] {
        let parsed: OrderStatus = status.as_str().parse().unwrap();
        assert_eq!(parsed, status);
    }
}
