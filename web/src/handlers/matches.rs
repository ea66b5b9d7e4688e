//! Open match endpoints.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use courtside_core::matches::{JoinOutcome, LeaveOutcome, MatchPlayer};
use courtside_core::types::{BookingId, OpenMatchSummary};

/// `POST /api/matches/:id/join`
///
/// # Errors
///
/// 400 when the match is full, already joined, the caller's own, or started;
/// 404 when it is not an active open match.
pub async fn join(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<BookingId>, PathRejection>,
) -> Result<Json<JoinOutcome>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.service.join_match(user, id).await?))
}

/// `DELETE /api/matches/:id/leave`
///
/// The response says whether the caller simply left, handed the match over,
/// or cancelled it.
///
/// # Errors
///
/// 404 when the caller is not in the match or it is not an active open match.
pub async fn leave(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<BookingId>, PathRejection>,
) -> Result<Json<LeaveOutcome>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.service.leave_match(user, id).await?))
}

/// `GET /api/matches/:id/participants`, organizer first.
///
/// # Errors
///
/// 404 for an unknown or private booking.
pub async fn participants(
    State(state): State<AppState>,
    id: Result<Path<BookingId>, PathRejection>,
) -> Result<Json<Vec<MatchPlayer>>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.service.match_participants(id).await?))
}

/// `GET /api/matches/open`
///
/// # Errors
///
/// 500 on storage failure.
pub async fn open(State(state): State<AppState>) -> Result<Json<Vec<OpenMatchSummary>>, AppError> {
    Ok(Json(state.service.open_matches().await?))
}
