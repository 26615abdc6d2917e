use std::collections::HashMap;
use std::env;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supplyhub_backend::handlers::operations::get_operation;
use supplyhub_backend::handlers::supplies::{
    delete_supplies, deliver_fictitious, deliver_supplies, list_hanging, list_supplies,
    move_orders, ship_fictitious,
};
use supplyhub_backend::jobs;
use supplyhub_backend::services::onec_integration::OneCIntegration;
use supplyhub_backend::services::shipment_log::ShipmentLogService;
use supplyhub_backend::services::supply_lifecycle::SupplyLifecycleService;
use supplyhub_backend::services::wb_client::WbApiService;
use supplyhub_backend::AppState;

/// account -> value maps (WB tokens, INNs) live in JSON files next to the env
fn load_json_map(path: &str) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::error!("Failed to parse {}: {}", path, e);
                HashMap::new()
            }
        },
        Err(e) => {
            tracing::warn!("Could not read {}: {}", path, e);
            HashMap::new()
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,supplyhub_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // WB cabinets
    let tokens_path = env::var("WB_TOKENS_PATH").unwrap_or_else(|_| "tokens.json".to_string());
    let tokens = load_json_map(&tokens_path);
    if tokens.is_empty() {
        tracing::warn!("No WB tokens loaded from {}", tokens_path);
    } else {
        tracing::info!("Loaded {} WB accounts", tokens.len());
    }
    let wb = WbApiService::new(tokens);

    // 1C integration
    let inn_path = env::var("ACCOUNT_INN_PATH").unwrap_or_else(|_| "account_inn.json".to_string());
    let onec = OneCIntegration::new(
        env::var("ONEC_URL").unwrap_or_default(),
        env::var("ONEC_USER").unwrap_or_default(),
        env::var("ONEC_PASSWORD").unwrap_or_default(),
        load_json_map(&inn_path),
        wb.clone(),
    );

    // Shipment-log / reservation service
    let shipment_url =
        env::var("SHIPMENT_API_URL").unwrap_or_else(|_| "http://localhost:8100".to_string());
    let shipment = ShipmentLogService::new(shipment_url);

    let lifecycle = SupplyLifecycleService::new(db.clone(), wb.clone(), onec, shipment);

    // Background jobs
    jobs::hanging_supplies_sync::start_hanging_supplies_sync_job(
        db.clone(),
        wb.clone(),
        lifecycle.clone(),
    )
    .await;
    jobs::empty_supply_cleanup::start_empty_supply_cleanup_job(db.clone(), wb.clone()).await;
    jobs::order_snapshot_sync::start_order_snapshot_sync_job(db.clone(), wb.clone()).await;

    let state = AppState {
        db,
        wb,
        lifecycle,
    };

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route("/supplies", get(list_supplies))
        .route("/supplies/move-orders", post(move_orders))
        .route("/supplies/deliver-fictitious", post(deliver_fictitious))
        .route("/supplies/ship-fictitious", post(ship_fictitious))
        .route("/supplies/deliver", post(deliver_supplies))
        .route("/supplies/delete", post(delete_supplies))
        .route("/supplies/hanging", get(list_hanging))
        .route("/operations/{operation_id}", get(get_operation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .unwrap();

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "supplyhub-backend is up"
}
