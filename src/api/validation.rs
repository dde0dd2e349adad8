use super::ApiError;
use crate::scheduler::parse_interval;

pub fn validate_stack_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid stack ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(ApiError::validation(
            "Invalid username. Must not be empty or contain any whitespace",
        ));
    }
    Ok(username)
}

pub fn validate_reference_name(reference: &str) -> Result<&str, ApiError> {
    if reference.trim().is_empty() {
        return Err(ApiError::validation(
            "Repository reference name must not be empty",
        ));
    }
    Ok(reference)
}

/// Shared autoupdate policy: an absent or empty interval disables the job;
/// anything else must parse as a duration or cron expression.
pub fn validate_auto_update(interval: Option<&str>) -> Result<(), ApiError> {
    match interval {
        None => Ok(()),
        Some(raw) if raw.trim().is_empty() => Ok(()),
        Some(raw) => parse_interval(raw)
            .map(|_| ())
            .map_err(|e| ApiError::validation(e.to_string())),
    }
}

pub fn validate_stack_file_content(content: &str) -> Result<&str, ApiError> {
    if content.is_empty() {
        return Err(ApiError::validation("Invalid stack file content"));
    }
    if content.len() > crate::constants::limits::MAX_MANIFEST_BYTES {
        return Err(ApiError::validation("Stack file content is too large"));
    }
    Ok(content)
}
