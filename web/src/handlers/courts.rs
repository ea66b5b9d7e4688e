//! Court listing.

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State};
use courtside_core::types::Court;

/// `GET /api/courts`: active courts ordered by name.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Court>>, AppError> {
    Ok(Json(state.service.courts().await?))
}
