use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::models::orders::{OrderStatusPair, WbOrder, WbSticker};

const SUPPLIES_URL: &str = "https://marketplace-api.wildberries.ru/api/v3/supplies";
const ORDERS_URL: &str = "https://marketplace-api.wildberries.ru/api/v3/orders";

/// WB caps the batched status endpoint at 1000 orders per call
pub const STATUS_BATCH_LIMIT: usize = 1000;
/// WB caps the sticker endpoint at 99 orders per call
pub const STICKER_BATCH_LIMIT: usize = 99;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WbSupply {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
struct SuppliesPage {
    #[serde(default)]
    supplies: Vec<WbSupply>,
    #[serde(default)]
    next: i64,
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<WbOrder>,
    #[serde(default)]
    next: i64,
}

#[derive(Debug, Deserialize)]
struct SupplyOrdersResponse {
    #[serde(default)]
    orders: Vec<WbOrder>,
}

#[derive(Debug, Deserialize)]
struct CreatedSupply {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusRow {
    id: i64,
    #[serde(rename = "supplierStatus", default)]
    supplier_status: String,
    #[serde(rename = "wbStatus", default)]
    wb_status: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusesResponse {
    #[serde(default)]
    orders: Vec<OrderStatusRow>,
}

#[derive(Debug, Deserialize)]
struct StickersResponse {
    #[serde(default)]
    stickers: Vec<WbSticker>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Async client over the WB marketplace supplies/orders endpoints. Calls are
/// scoped to one seller account; mutating calls retry with fixed backoff and
/// surface per-call errors for the caller to classify item by item.
#[derive(Clone)]
pub struct WbApiService {
    client: Client,
    /// account -> API token
    tokens: HashMap<String, String>,
    supplies_url: String,
    orders_url: String,
    supply_info_cache: Arc<Cache<String, WbSupply>>,
}

impl WbApiService {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self::with_base_urls(tokens, SUPPLIES_URL.to_string(), ORDERS_URL.to_string())
    }

    pub fn with_base_urls(
        tokens: HashMap<String, String>,
        supplies_url: String,
        orders_url: String,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self {
            client: Client::new(),
            tokens,
            supplies_url,
            orders_url,
            supply_info_cache: Arc::new(cache),
        }
    }

    pub fn accounts(&self) -> Vec<String> {
        self.tokens.keys().cloned().collect()
    }

    fn token(&self, account: &str) -> Result<&str, Box<dyn std::error::Error + Send + Sync>> {
        self.tokens
            .get(account)
            .map(|t| t.as_str())
            .ok_or_else(|| format!("No WB token configured for account {}", account).into())
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
    ) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", token)
            .header("accept", "application/json")
    }

    /// Sends a request with bounded retries and fixed backoff. Retries cover
    /// transport errors, 429 and 5xx; other statuses return immediately.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response, Box<dyn std::error::Error + Send + Sync>> {
        let mut last_error: Option<String> = None;

        for attempt in 1..=RETRY_ATTEMPTS {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_error = Some(format!("WB API returned {}", status));
                        tracing::warn!(
                            "WB API {} on attempt {}/{}, retrying",
                            status,
                            attempt,
                            RETRY_ATTEMPTS
                        );
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    tracing::warn!(
                        "WB API request failed on attempt {}/{}: {}",
                        attempt,
                        RETRY_ATTEMPTS,
                        e
                    );
                }
            }

            if attempt < RETRY_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| "WB API request failed".to_string())
            .into())
    }

    async fn read_error(response: reqwest::Response) -> String {
        let status = response.status();
        match response.text().await {
            Ok(body) => {
                if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
                    if !parsed.code.is_empty() || !parsed.message.is_empty() {
                        return format!("{} {}: {}", status, parsed.code, parsed.message);
                    }
                }
                format!("{}: {}", status, body)
            }
            Err(_) => status.to_string(),
        }
    }

    /// All supplies of an account, paginated via the opaque `next` cursor
    pub async fn get_supplies(
        &self,
        account: &str,
    ) -> Result<Vec<WbSupply>, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let mut supplies = Vec::new();
        let mut next = 0i64;

        loop {
            let url = self.supplies_url.clone();
            let response = self
                .send_with_retry(|| {
                    let params = [
                        ("limit", "1000".to_string()),
                        ("next", next.to_string()),
                    ];
                    self.request(Method::GET, &url, &token).query(&params)
                })
                .await?;

            if !response.status().is_success() {
                return Err(Self::read_error(response).await.into());
            }

            let page: SuppliesPage = response.json().await?;
            supplies.extend(page.supplies);
            next = page.next;
            tracing::debug!(
                "Fetched {} supplies so far, next {}, account {}",
                supplies.len(),
                next,
                account
            );
            if next == 0 {
                break;
            }
        }

        Ok(supplies)
    }

    /// Supplies still assembling (done=false)
    pub async fn get_open_supplies(
        &self,
        account: &str,
    ) -> Result<Vec<WbSupply>, Box<dyn std::error::Error + Send + Sync>> {
        let supplies = self.get_supplies(account).await?;
        Ok(supplies.into_iter().filter(|s| !s.done).collect())
    }

    /// Current order set of one supply as the marketplace reports it
    pub async fn get_supply_orders(
        &self,
        account: &str,
        supply_id: &str,
    ) -> Result<Vec<WbOrder>, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = format!("{}/{}/orders", self.supplies_url, supply_id);

        let response = self
            .send_with_retry(|| self.request(Method::GET, &url, &token))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await.into());
        }

        let body: SupplyOrdersResponse = response.json().await?;
        Ok(body.orders)
    }

    /// Supply info (name, done flag), cached for a minute per (account, supply)
    pub async fn get_supply_info(
        &self,
        account: &str,
        supply_id: &str,
    ) -> Result<WbSupply, Box<dyn std::error::Error + Send + Sync>> {
        let cache_key = format!("{}:{}", account, supply_id);
        if let Some(cached) = self.supply_info_cache.get(&cache_key).await {
            return Ok(cached);
        }

        let token = self.token(account)?.to_string();
        let url = format!("{}/{}", self.supplies_url, supply_id);

        let response = self
            .send_with_retry(|| self.request(Method::GET, &url, &token))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await.into());
        }

        let supply: WbSupply = response.json().await?;
        self.supply_info_cache
            .insert(cache_key, supply.clone())
            .await;
        Ok(supply)
    }

    /// Creates a supply, returning the marketplace-assigned id
    pub async fn create_supply(
        &self,
        account: &str,
        name: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = self.supplies_url.clone();
        let body = serde_json::json!({ "name": name });

        let response = self
            .send_with_retry(|| self.request(Method::POST, &url, &token).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await.into());
        }

        let created: CreatedSupply = response.json().await?;
        tracing::info!(
            "Created supply {} ({}) for account {}",
            created.id,
            name,
            account
        );
        Ok(created.id)
    }

    /// Adds one order to a supply. Success is an empty 204; any error payload
    /// is surfaced as the per-order failure reason.
    pub async fn add_order_to_supply(
        &self,
        account: &str,
        supply_id: &str,
        order_id: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = format!("{}/{}/orders/{}", self.supplies_url, supply_id, order_id);

        let response = self
            .send_with_retry(|| self.request(Method::PATCH, &url, &token))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await.into());
        }

        Ok(())
    }

    /// Pushes a supply into delivery (done=true on the marketplace side)
    pub async fn deliver_supply(
        &self,
        account: &str,
        supply_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = format!("{}/{}/deliver", self.supplies_url, supply_id);

        let response = self
            .send_with_retry(|| self.request(Method::PATCH, &url, &token))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await.into());
        }

        tracing::info!("Supply {} ({}) sent to delivery", supply_id, account);
        Ok(())
    }

    pub async fn delete_supply(
        &self,
        account: &str,
        supply_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = format!("{}/{}", self.supplies_url, supply_id);

        let response = self
            .send_with_retry(|| self.request(Method::DELETE, &url, &token))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await.into());
        }

        Ok(())
    }

    /// Full account order list, paginated
    pub async fn get_orders(
        &self,
        account: &str,
    ) -> Result<Vec<WbOrder>, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let mut orders = Vec::new();
        let mut next = 0i64;

        loop {
            let url = self.orders_url.clone();
            let response = self
                .send_with_retry(|| {
                    let params = [
                        ("limit", "1000".to_string()),
                        ("next", next.to_string()),
                    ];
                    self.request(Method::GET, &url, &token).query(&params)
                })
                .await?;

            if !response.status().is_success() {
                return Err(Self::read_error(response).await.into());
            }

            let page: OrdersPage = response.json().await?;
            orders.extend(page.orders);
            next = page.next;
            tracing::debug!(
                "Fetched {} orders so far, next {}, account {}",
                orders.len(),
                next,
                account
            );
            if next == 0 {
                break;
            }
        }

        Ok(orders)
    }

    /// Batched (supplierStatus, wbStatus) lookup; splits into chunks of 1000
    pub async fn get_order_statuses(
        &self,
        account: &str,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, OrderStatusPair>, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = format!("{}/status", self.orders_url);
        let mut statuses = HashMap::with_capacity(order_ids.len());

        for batch in order_ids.chunks(STATUS_BATCH_LIMIT) {
            let body = serde_json::json!({ "orders": batch });
            let response = self
                .send_with_retry(|| self.request(Method::POST, &url, &token).json(&body))
                .await?;

            if !response.status().is_success() {
                return Err(Self::read_error(response).await.into());
            }

            let parsed: OrderStatusesResponse = response.json().await?;
            for row in parsed.orders {
                statuses.insert(
                    row.id,
                    OrderStatusPair::new(row.supplier_status, row.wb_status),
                );
            }
        }

        Ok(statuses)
    }

    /// Stickers for the given orders; WB may return a partial set, callers
    /// must check which ids actually came back.
    pub async fn get_stickers(
        &self,
        account: &str,
        order_ids: &[i64],
    ) -> Result<Vec<WbSticker>, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.token(account)?.to_string();
        let url = format!(
            "{}/stickers?type=png&width=58&height=40",
            self.orders_url
        );
        let mut stickers = Vec::new();

        for batch in order_ids.chunks(STICKER_BATCH_LIMIT) {
            let body = serde_json::json!({ "orders": batch });
            let response = self
                .send_with_retry(|| self.request(Method::POST, &url, &token).json(&body))
                .await?;

            if !response.status().is_success() {
                return Err(Self::read_error(response).await.into());
            }

            let parsed: StickersResponse = response.json().await?;
            tracing::debug!(
                "Sticker batch returned {} of {} requested, account {}",
                parsed.stickers.len(),
                batch.len(),
                account
            );
            stickers.extend(parsed.stickers);
        }

        tracing::info!(
            "Fetched {} stickers for {} orders, account {}",
            stickers.len(),
            order_ids.len(),
            account
        );
        Ok(stickers)
    }
}
