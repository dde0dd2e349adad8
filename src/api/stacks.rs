//! Stack endpoints. The update handler discriminates the payload shape by
//! the stack's management mode: a git-managed stack only accepts the git
//! payload and a file-managed stack only accepts the file payload, so a
//! stack can never switch modes here.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{
    validate_auto_update, validate_reference_name, validate_stack_file_content, validate_stack_id,
};
use super::{ApiError, ApiResponse, AppState, StackDto};
use crate::models::StackSource;
use crate::services::stack_update::{FileStackUpdate, GitStackUpdate, StackUpdatePayload};

/// GET /stacks/{id}
pub async fn get_stack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<StackDto>>, ApiError> {
    let id = validate_stack_id(id)?;

    let stack = state
        .store()
        .stack_by_id(id)
        .await?
        .ok_or_else(|| ApiError::stack_not_found(id))?;

    Ok(Json(ApiResponse::success(StackDto::from(&stack))))
}

/// PUT /stacks/{id}/kubernetes
pub async fn update_kubernetes_stack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    caller: Option<Extension<CurrentUser>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<StackDto>>, ApiError> {
    let id = validate_stack_id(id)?;

    let mut stack = state
        .store()
        .stack_by_id(id)
        .await?
        .ok_or_else(|| ApiError::stack_not_found(id))?;

    let payload = match &stack.source {
        StackSource::Git(_) => {
            let payload: GitStackUpdate = serde_json::from_value(body)
                .map_err(|e| ApiError::validation(format!("Invalid request payload: {e}")))?;
            validate_reference_name(&payload.repository_reference_name)?;
            validate_auto_update(
                payload
                    .auto_update
                    .as_ref()
                    .map(|settings| settings.interval.as_str()),
            )?;
            StackUpdatePayload::Git(payload)
        }
        StackSource::File => {
            let payload: FileStackUpdate = serde_json::from_value(body)
                .map_err(|e| ApiError::validation(format!("Invalid request payload: {e}")))?;
            validate_stack_file_content(&payload.stack_file_content)?;
            StackUpdatePayload::File(payload)
        }
    };

    let caller_name = caller.as_ref().map(|ext| ext.0.0.as_str());

    state
        .stack_updater()
        .update_kubernetes_stack(&mut stack, payload, caller_name)
        .await?;

    // The update itself leaves no durable record changes (other than the
    // deliberate file-branch rename); the record is committed here, after
    // the branch ran to completion.
    state.store().update_stack(&stack).await?;

    Ok(Json(ApiResponse::success(StackDto::from(&stack))))
}
