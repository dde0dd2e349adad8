use axum::{Json, extract::State};
use std::sync::Arc;

use super::validation::validate_username;
use super::{ApiError, ApiResponse, AppState, UserDto};
use crate::services::user_service::CreateUserInput;

/// POST /users
/// Create a new user under the instance's authentication policy.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserInput>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    validate_username(&payload.username)?;
    payload.validated_role()?;

    let user = state.user_service().create_user(payload).await?;

    Ok(Json(ApiResponse::success(UserDto::from(&user))))
}
