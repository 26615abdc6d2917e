//! Operation-id persistence
//!
//! Multi-step operations record a row at start and finish it with the
//! response or error. A client that lost its connection polls the stored
//! result instead of re-submitting; a repeated request with a completed
//! operation id short-circuits to the persisted response.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter, Set};

use crate::entities::prelude::SupplyOperations;
use crate::entities::supply_operations;

pub const STATUS_PROCESSING: &str = "PROCESSING";
pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILED: &str = "FAILED";

/// Records the start of an operation. Returns false when the operation id is
/// already taken (duplicate submission).
pub async fn save_start(
    db: &DatabaseConnection,
    operation_id: &str,
    operator: Option<String>,
    request_payload: serde_json::Value,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let model = supply_operations::ActiveModel {
        operation_id: Set(operation_id.to_string()),
        operator: Set(operator),
        request_payload: Set(request_payload),
        status: Set(STATUS_PROCESSING.to_string()),
        ..Default::default()
    };

    let inserted = SupplyOperations::insert(model)
        .on_conflict(
            OnConflict::column(supply_operations::Column::OperationId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted == 0 {
        tracing::warn!("Operation {} already exists", operation_id);
        return Ok(false);
    }

    tracing::info!("Operation {} started", operation_id);
    Ok(true)
}

pub async fn save_success(
    db: &DatabaseConnection,
    operation_id: &str,
    response_data: serde_json::Value,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(record) = find(db, operation_id).await? else {
        tracing::warn!("Operation {} not found for success update", operation_id);
        return Ok(());
    };

    let mut active = record.into_active_model();
    active.response_data = Set(Some(response_data));
    active.status = Set(STATUS_SUCCESS.to_string());
    active.completed_at = Set(Some(Utc::now().into()));
    active.update(db).await?;

    tracing::info!("Operation {} completed successfully", operation_id);
    Ok(())
}

pub async fn save_error(
    db: &DatabaseConnection,
    operation_id: &str,
    error_message: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(record) = find(db, operation_id).await? else {
        tracing::warn!("Operation {} not found for error update", operation_id);
        return Ok(());
    };

    let mut active = record.into_active_model();
    active.error_message = Set(Some(error_message.to_string()));
    active.status = Set(STATUS_FAILED.to_string());
    active.completed_at = Set(Some(Utc::now().into()));
    active.update(db).await?;

    tracing::info!("Operation {} failed: {}", operation_id, error_message);
    Ok(())
}

pub async fn find(
    db: &DatabaseConnection,
    operation_id: &str,
) -> Result<Option<supply_operations::Model>, Box<dyn std::error::Error + Send + Sync>> {
    let record = SupplyOperations::find()
        .filter(supply_operations::Column::OperationId.eq(operation_id))
        .one(db)
        .await?;
    Ok(record)
}
