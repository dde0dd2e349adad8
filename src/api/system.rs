use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, SystemStatus};

/// GET /system/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let database_ok = state.store().ping().await.is_ok();
    let stacks = state.store().list_stacks().await.map(|s| s.len()).unwrap_or(0);

    Ok(Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database_ok,
        stacks,
    })))
}
