use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::CheckRequest;
use crate::rate_limit::{Action, Decision};
use crate::state::AppState;

// Identifiers become store keys and REST filters, so they stay short
const MAX_FIELD_BYTES: usize = 256;

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if v.len() > MAX_FIELD_BYTES => Err(AppError::Validation(format!(
            "{field} longer than {MAX_FIELD_BYTES} bytes"
        ))),
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("Missing required field: {field}"))),
    }
}

pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Decision, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let action = required(request.action, "action")?;
    let identifier = required(request.identifier, "identifier")?;

    let decision = state
        .limiter
        .check(Action::from_name(&action), &identifier)
        .await?;
    Ok(decision)
}
