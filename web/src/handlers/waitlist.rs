//! Waiting list endpoints.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use courtside_core::types::{Booking, CourtId, WaitingListEntry};
use courtside_core::waitlist::JoinWaitlist;
use serde::Deserialize;

/// Body of `POST /api/waiting-list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWaitlistRequest {
    /// Court of the occupied slot
    pub court_id: CourtId,
    /// Start of the occupied booking
    pub slot_start_time: DateTime<Utc>,
    /// Requested end
    pub slot_end_time: DateTime<Utc>,
}

/// Body of `POST /api/waiting-list/confirm`, or the query of the emailed
/// `GET` link.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Token from the offer email
    pub token: String,
}

/// Register for an occupied slot.
///
/// # Errors
///
/// 400 for a free, past or own slot and for duplicate registrations.
pub async fn join(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<JoinWaitlistRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WaitingListEntry>), AppError> {
    let Json(request) = payload?;
    let entry = state
        .service
        .join_waitlist(
            user,
            JoinWaitlist {
                court_id: request.court_id,
                slot_start_time: request.slot_start_time,
                slot_end_time: request.slot_end_time,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Turn an offer into a booking. Public: the token is the credential.
///
/// # Errors
///
/// 400 when the token is unknown, used or expired, or someone booked the slot first.
pub async fn confirm(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(request) = payload?;
    let booking = state.service.confirm_from_token(request.token.trim()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Target of the link in the offer email: `GET /api/waiting-list/confirm?token=...`.
///
/// # Errors
///
/// Same as [`confirm`].
pub async fn confirm_link(
    State(state): State<AppState>,
    query: Result<Query<ConfirmRequest>, QueryRejection>,
) -> Result<Json<Booking>, AppError> {
    let Query(request) = query?;
    let booking = state.service.confirm_from_token(request.token.trim()).await?;
    Ok(Json(booking))
}
