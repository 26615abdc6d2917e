use axum::{extract::Query, extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Deserialize;

use crate::models::supplies::{
    DeliverFictitiousRequest, DeliverFictitiousResponse, DeliverSuppliesRequest,
    DeliverSuppliesResponse, ErrorResponse, HangingSupplyListResponse, HangingSupplyView,
    MoveOrdersRequest, MoveOrdersResponse, ShipFictitiousRequest, ShipFictitiousResponse,
    SupplyDeleteItem, SupplyDeleteRequest, SupplyDeleteResponse, SupplyListEntry,
    SupplyListResponse, SupplyOrderBrief,
};
use crate::services::article_codes::normalize_vendor_code;
use crate::services::hanging_store;
use crate::services::operations_store;
use crate::services::supply_lifecycle::LifecycleError;
use crate::AppState;

fn lifecycle_error_response(e: LifecycleError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        LifecycleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LifecycleError::DataIntegrity(_) => StatusCode::CONFLICT,
        LifecycleError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// DD.MM.YYYY as the cabinet operators read supply dates
fn format_supply_date(iso: &str) -> String {
    iso.parse::<DateTime<Utc>>()
        .map(|dt| dt.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| iso.to_string())
}

/// POST /supplies/move-orders
///
/// A request carrying a completed operation_id returns the persisted result
/// without touching the marketplace; otherwise the move runs and its outcome
/// is recorded under that id for later polls.
pub async fn move_orders(
    State(state): State<AppState>,
    Json(payload): Json<MoveOrdersRequest>,
) -> Result<Json<MoveOrdersResponse>, (StatusCode, Json<ErrorResponse>)> {
    if let Some(operation_id) = &payload.operation_id {
        match operations_store::find(&state.db, operation_id).await {
            Ok(Some(record)) if record.status == operations_store::STATUS_SUCCESS => {
                if let Some(stored) = record.response_data {
                    match serde_json::from_value::<MoveOrdersResponse>(stored) {
                        Ok(response) => {
                            tracing::info!(
                                "Operation {} already completed, returning stored result",
                                operation_id
                            );
                            return Ok(Json(response));
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Stored result of operation {} is unreadable, re-running: {}",
                                operation_id,
                                e
                            );
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => return Err(internal_error(e)),
        }

        let request_json = serde_json::to_value(&payload).unwrap_or_default();
        if let Err(e) = operations_store::save_start(
            &state.db,
            operation_id,
            payload.operator.clone(),
            request_json,
        )
        .await
        {
            return Err(internal_error(e));
        }
    }

    let result = state.lifecycle.move_orders(&payload).await;

    if let Some(operation_id) = &payload.operation_id {
        match &result {
            Ok(response) => {
                let response_json = serde_json::to_value(response).unwrap_or_default();
                if let Err(e) =
                    operations_store::save_success(&state.db, operation_id, response_json).await
                {
                    tracing::error!("Failed to persist operation {} result: {}", operation_id, e);
                }
            }
            Err(e) => {
                if let Err(e2) =
                    operations_store::save_error(&state.db, operation_id, &e.to_string()).await
                {
                    tracing::error!("Failed to persist operation {} error: {}", operation_id, e2);
                }
            }
        }
    }

    result.map(Json).map_err(lifecycle_error_response)
}

/// POST /supplies/deliver-fictitious
pub async fn deliver_fictitious(
    State(state): State<AppState>,
    Json(payload): Json<DeliverFictitiousRequest>,
) -> Result<Json<DeliverFictitiousResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.supplies.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "supplies map is empty".to_string(),
            }),
        ));
    }

    let response = state
        .lifecycle
        .deliver_fictitious_batch(&payload.supplies, &payload.operator)
        .await;
    Ok(Json(response))
}

/// POST /supplies/ship-fictitious
pub async fn ship_fictitious(
    State(state): State<AppState>,
    Json(payload): Json<ShipFictitiousRequest>,
) -> Result<Json<ShipFictitiousResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .lifecycle
        .ship_fictitious_quantity(&payload)
        .await
        .map(Json)
        .map_err(lifecycle_error_response)
}

/// POST /supplies/deliver
pub async fn deliver_supplies(
    State(state): State<AppState>,
    Json(payload): Json<DeliverSuppliesRequest>,
) -> Result<Json<DeliverSuppliesResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .lifecycle
        .deliver_supplies(&payload)
        .await
        .map(Json)
        .map_err(lifecycle_error_response)
}

/// GET /supplies
///
/// Open (done=false) supplies of every account with their current orders.
/// An account that fails to answer is skipped; the rest still list.
pub async fn list_supplies(
    State(state): State<AppState>,
) -> Json<SupplyListResponse> {
    let supply_futures: Vec<_> = state
        .wb
        .accounts()
        .into_iter()
        .map(|account| {
            let wb = state.wb.clone();
            async move {
                let result = wb.get_open_supplies(&account).await;
                (account, result)
            }
        })
        .collect();

    let mut order_futures = Vec::new();
    for (account, result) in join_all(supply_futures).await {
        match result {
            Ok(supplies) => {
                for supply in supplies {
                    let wb = state.wb.clone();
                    let account = account.clone();
                    order_futures.push(async move {
                        let orders = wb.get_supply_orders(&account, &supply.id).await;
                        (account, supply, orders)
                    });
                }
            }
            Err(e) => {
                tracing::error!("Failed to list supplies for account {}: {}", account, e);
            }
        }
    }

    let mut entries = Vec::new();
    for (account, supply, orders) in join_all(order_futures).await {
        let orders = match orders {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(
                    "Failed to fetch orders of supply {} ({}): {}",
                    supply.id,
                    account,
                    e
                );
                continue;
            }
        };

        entries.push(SupplyListEntry {
            name: supply.name.clone(),
            created_at: format_supply_date(&supply.created_at),
            supply_id: supply.id.clone(),
            account: account.clone(),
            count: orders.len(),
            orders: orders
                .iter()
                .map(|o| SupplyOrderBrief {
                    order_id: o.id,
                    nm_id: o.nm_id,
                    local_vendor_code: normalize_vendor_code(&o.article),
                })
                .collect(),
        });
    }

    Json(SupplyListResponse { supplies: entries })
}

/// POST /supplies/delete
pub async fn delete_supplies(
    State(state): State<AppState>,
    Json(payload): Json<SupplyDeleteRequest>,
) -> Json<SupplyDeleteResponse> {
    let futures: Vec<_> = payload
        .supply
        .into_iter()
        .map(|item| {
            let wb = state.wb.clone();
            async move {
                let result = wb.delete_supply(&item.account, &item.supply_id).await;
                (item, result)
            }
        })
        .collect();

    let mut deleted = Vec::new();
    for (item, result) in join_all(futures).await {
        match result {
            Ok(()) => {
                tracing::info!("Supply {} ({}) deleted", item.supply_id, item.account);
                deleted.push(SupplyDeleteItem {
                    account: item.account,
                    supply_id: item.supply_id,
                });
            }
            Err(e) => {
                tracing::error!(
                    "Failed to delete supply {} ({}): {}",
                    item.supply_id,
                    item.account,
                    e
                );
            }
        }
    }

    Json(SupplyDeleteResponse { deleted })
}

#[derive(Debug, Deserialize)]
pub struct ListHangingParams {
    /// true lists fictitious-delivered supplies that still have unshipped
    /// orders; default lists active hanging supplies
    #[serde(default)]
    pub fictitious: bool,
}

/// GET /supplies/hanging
pub async fn list_hanging(
    State(state): State<AppState>,
    Query(params): Query<ListHangingParams>,
) -> Result<Json<HangingSupplyListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let records = if params.fictitious {
        hanging_store::get_fictitious_pending(&state.db).await
    } else {
        hanging_store::get_active(&state.db).await
    }
    .map_err(internal_error)?;

    let supplies = records
        .iter()
        .map(|record| HangingSupplyView {
            supply_id: record.supply_id.clone(),
            account: record.account.clone(),
            order_count: hanging_store::parse_orders(record).len(),
            shipped_count: hanging_store::parse_shipped(record).len(),
            is_fictitious_delivered: record.is_fictitious_delivered,
            fictitious_delivered_at: record.fictitious_delivered_at.map(|dt| dt.to_rfc3339()),
            fictitious_delivery_operator: record.fictitious_delivery_operator.clone(),
            created_at: record.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(HangingSupplyListResponse { supplies }))
}
