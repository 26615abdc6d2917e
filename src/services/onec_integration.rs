//! 1C ERP integration
//!
//! Formats dispatched supplies into the ERP's nested structure
//! (account -> wild -> supply -> orders) and posts it. Order details are
//! re-fetched from the marketplace rather than trusted from local state,
//! with the snapshot mirror as fallback for ids the live fetch misses.
//! Success is decided by the ERP's own response envelope, not HTTP status;
//! any exception becomes a structured error object so the orchestrator can
//! log a failed-but-not-fatal step and continue.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use futures_util::future::join_all;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::onec_delivery_log;
use crate::entities::prelude::OnecDeliveryLog;
use crate::models::orders::WbOrder;
use crate::models::supplies::SupplyShipmentInfo;
use crate::services::snapshot_store;
use crate::services::wb_client::WbApiService;

const ONEC_TIMEOUT_SECS: u64 = 240;

/// Response envelope the ERP returns (or a synthesized error variant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneCResponse {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl OneCResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            message: Some(message.into()),
            response: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OneCOrderItem {
    order_id: String,
    price: f64,
    nm_id: i64,
    count: i64,
}

#[derive(Debug, Serialize)]
struct OneCSupplyItem {
    supply_id: String,
    orders: Vec<OneCOrderItem>,
}

#[derive(Debug, Serialize)]
struct OneCWildItem {
    wild_code: String,
    supplies: Vec<OneCSupplyItem>,
}

#[derive(Debug, Serialize)]
struct OneCAccountItem {
    account: String,
    inn: String,
    data: Vec<OneCWildItem>,
}

#[derive(Debug, Serialize)]
struct OneCRequestBody {
    accounts: Vec<OneCAccountItem>,
}

/// Kopecks to rubles with 3 decimal places; malformed input degrades to 0
pub fn convert_price(kopecks: i64) -> f64 {
    (Decimal::from(kopecks) / Decimal::from(100))
        .round_dp(3)
        .to_f64()
        .unwrap_or(0.0)
}

#[derive(Clone)]
pub struct OneCIntegration {
    client: Client,
    url: String,
    user: String,
    password: String,
    /// account -> INN (legal entity id the ERP keys on)
    account_inn: HashMap<String, String>,
    wb: WbApiService,
}

impl OneCIntegration {
    pub fn new(
        url: String,
        user: String,
        password: String,
        account_inn: HashMap<String, String>,
        wb: WbApiService,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(ONEC_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url,
            user,
            password,
            account_inn,
            wb,
        }
    }

    /// Live order details for an account filtered to the requested ids, with
    /// the snapshot mirror filling any gaps.
    async fn get_order_details(
        &self,
        db: &DatabaseConnection,
        account: &str,
        order_ids: &[i64],
    ) -> Vec<WbOrder> {
        let wanted: HashSet<i64> = order_ids.iter().copied().collect();

        let mut found: Vec<WbOrder> = match self.wb.get_orders(account).await {
            Ok(all_orders) => all_orders
                .into_iter()
                .filter(|o| wanted.contains(&o.id))
                .collect(),
            Err(e) => {
                tracing::error!("Failed to fetch orders for account {}: {}", account, e);
                Vec::new()
            }
        };

        let found_ids: HashSet<i64> = found.iter().map(|o| o.id).collect();
        let missing: Vec<i64> = wanted.difference(&found_ids).copied().collect();

        if !missing.is_empty() {
            tracing::warn!(
                "{} of {} orders missing from the live fetch for account {}, using snapshots",
                missing.len(),
                order_ids.len(),
                account
            );
            match snapshot_store::get_orders_for_erp(db, account, &missing).await {
                Ok(from_snapshot) => found.extend(from_snapshot),
                Err(e) => tracing::error!(
                    "Snapshot fallback failed for account {}: {}",
                    account,
                    e
                ),
            }
        }

        tracing::info!(
            "Resolved {} of {} order details for account {}",
            found.len(),
            order_ids.len(),
            account
        );
        found
    }

    fn build_request_body(
        &self,
        accounts_orders: &HashMap<String, Vec<WbOrder>>,
        order_wild_map: &HashMap<i64, String>,
        order_supply_map: &HashMap<i64, String>,
    ) -> OneCRequestBody {
        let mut accounts = Vec::new();

        for (account, orders) in accounts_orders {
            // wild -> supply -> orders
            let mut wild_supplies: HashMap<String, HashMap<String, Vec<OneCOrderItem>>> =
                HashMap::new();

            for order in orders {
                let Some(wild) = order_wild_map.get(&order.id) else {
                    tracing::warn!("No wild code for order {}", order.id);
                    continue;
                };
                let Some(supply_id) = order_supply_map.get(&order.id) else {
                    tracing::warn!("No supply id for order {}", order.id);
                    continue;
                };

                wild_supplies
                    .entry(wild.clone())
                    .or_default()
                    .entry(supply_id.clone())
                    .or_default()
                    .push(OneCOrderItem {
                        order_id: order.id.to_string(),
                        price: convert_price(order.converted_price),
                        nm_id: order.nm_id,
                        count: 1,
                    });
            }

            if wild_supplies.is_empty() {
                continue;
            }

            let data: Vec<OneCWildItem> = wild_supplies
                .into_iter()
                .map(|(wild_code, supplies)| OneCWildItem {
                    wild_code,
                    supplies: supplies
                        .into_iter()
                        .map(|(supply_id, orders)| OneCSupplyItem { supply_id, orders })
                        .collect(),
                })
                .collect();

            accounts.push(OneCAccountItem {
                account: account.clone(),
                inn: self.account_inn.get(account).cloned().unwrap_or_default(),
                data,
            });
        }

        OneCRequestBody { accounts }
    }

    async fn post(&self, body: &OneCRequestBody) -> OneCResponse {
        if self.user.is_empty() || self.password.is_empty() {
            return OneCResponse::error("1C credentials are not configured");
        }

        let result = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Failed to send data to 1C: {}", e);
                return OneCResponse::error(format!("Failed to send data to 1C: {}", e));
            }
        };

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Failed to read 1C response: {}", e);
                return OneCResponse::error(format!("Failed to read 1C response: {}", e));
            }
        };

        match serde_json::from_str::<OneCResponse>(&text) {
            Ok(parsed) => {
                tracing::info!("1C responded with status_code {}", parsed.status_code);
                parsed
            }
            Err(e) => {
                tracing::error!("Malformed JSON from 1C: {} ({})", text, e);
                OneCResponse::error(format!("Malformed JSON from 1C: {}", e))
            }
        }
    }

    /// Formats and sends a delivery event. Never raises: all failures come
    /// back as an error-shaped OneCResponse.
    pub async fn send_delivery(
        &self,
        db: &DatabaseConnection,
        supplies: &[SupplyShipmentInfo],
        order_wild_map: &HashMap<i64, String>,
    ) -> OneCResponse {
        tracing::info!(
            "Formatting 1C delivery payload: {} supplies, {} mapped orders",
            supplies.len(),
            order_wild_map.len()
        );

        let mut accounts_orders_ids: HashMap<String, Vec<i64>> = HashMap::new();
        let mut order_supply_map: HashMap<i64, String> = HashMap::new();
        for supply in supplies {
            accounts_orders_ids
                .entry(supply.account.clone())
                .or_default()
                .extend(&supply.order_ids);
            for order_id in &supply.order_ids {
                order_supply_map.insert(*order_id, supply.supply_id.clone());
            }
        }

        let futures: Vec<_> = accounts_orders_ids
            .iter()
            .map(|(account, ids)| {
                let account = account.clone();
                let ids = ids.clone();
                async move {
                    let details = self.get_order_details(db, &account, &ids).await;
                    (account, details)
                }
            })
            .collect();

        let accounts_orders: HashMap<String, Vec<WbOrder>> =
            join_all(futures).await.into_iter().collect();

        let body = self.build_request_body(&accounts_orders, order_wild_map, &order_supply_map);
        let response = self.post(&body).await;

        if let Err(e) = self.save_delivery_logs(db, &body, &response).await {
            tracing::error!("Failed to persist 1C delivery logs: {}", e);
        }

        response
    }

    /// Per-order audit rows for the sent payload, success or not
    async fn save_delivery_logs(
        &self,
        db: &DatabaseConnection,
        body: &OneCRequestBody,
        response: &OneCResponse,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let integration_id = Uuid::new_v4().to_string();
        let sent_at = Utc::now();
        let status = if response.is_success() {
            "success"
        } else {
            "error"
        };
        let error_details = if response.is_success() {
            None
        } else {
            Some(serde_json::json!({
                "status_code": response.status_code,
                "message": response.message,
            }))
        };

        let mut rows = Vec::new();
        for account in &body.accounts {
            for wild in &account.data {
                for supply in &wild.supplies {
                    for order in &supply.orders {
                        rows.push(onec_delivery_log::ActiveModel {
                            integration_id: Set(integration_id.clone()),
                            account_name: Set(account.account.clone()),
                            inn: Set(Some(account.inn.clone())),
                            supply_id: Set(supply.supply_id.clone()),
                            wild_code: Set(wild.wild_code.clone()),
                            order_id: Set(order.order_id.parse().unwrap_or_default()),
                            nm_id: Set(Some(order.nm_id)),
                            price: Set(Some(order.price)),
                            count: Set(order.count as i32),
                            status: Set(status.to_string()),
                            sent_at: Set(sent_at.into()),
                            response_data: Set(response.response.clone()),
                            error_details: Set(error_details.clone()),
                            ..Default::default()
                        });
                    }
                }
            }
        }

        if rows.is_empty() {
            return Ok(());
        }

        let count = rows.len();
        OnecDeliveryLog::insert_many(rows)
            .exec_without_returning(db)
            .await?;
        tracing::info!(
            "Saved {} 1C delivery log rows (integration {})",
            count,
            integration_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_price_rounds_to_three_places() {
        assert_eq!(convert_price(123456), 1234.56);
        assert_eq!(convert_price(100), 1.0);
        assert_eq!(convert_price(333), 3.33);
        assert_eq!(convert_price(0), 0.0);
    }

    #[test]
    fn test_envelope_success_is_status_code_based() {
        let ok: OneCResponse = serde_json::from_str(r#"{"status_code": 200}"#).unwrap();
        assert!(ok.is_success());

        // HTTP 200 with an error envelope is still a failure
        let err: OneCResponse =
            serde_json::from_str(r#"{"status_code": 500, "message": "bad"}"#).unwrap();
        assert!(!err.is_success());

        // Missing status_code defaults to 0 -> not success
        let empty: OneCResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!empty.is_success());
    }
}
