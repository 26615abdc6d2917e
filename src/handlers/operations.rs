use axum::{extract::Path, extract::State, http::StatusCode, Json};

use crate::models::supplies::{ErrorResponse, OperationView};
use crate::services::operations_store;
use crate::AppState;

/// GET /operations/{operation_id}
///
/// Poll endpoint for clients that lost their connection mid-operation.
pub async fn get_operation(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Json<OperationView>, (StatusCode, Json<ErrorResponse>)> {
    let record = operations_store::find(&state.db, &operation_id)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    match record {
        Some(record) => Ok(Json(OperationView {
            operation_id: record.operation_id,
            status: record.status,
            response_data: record.response_data,
            error_message: record.error_message,
            created_at: record.created_at.to_rfc3339(),
            completed_at: record.completed_at.map(|dt| dt.to_rfc3339()),
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Operation {} not found", operation_id),
            }),
        )),
    }
}
