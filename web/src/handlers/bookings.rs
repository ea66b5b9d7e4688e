//! Booking endpoints.
//!
//! - `POST /api/bookings` - Reserve a court (private booking or open match)
//! - `GET /api/bookings/me` - The caller's active bookings
//! - `DELETE /api/bookings/:id` - Cancel one of the caller's bookings

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use courtside_core::booking::CreateBooking;
use courtside_core::types::{Booking, BookingId, CourtId, UserBooking};
use serde::Deserialize;

/// Body of `POST /api/bookings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Court to reserve
    pub court_id: CourtId,
    /// Start, ISO 8601
    pub start_time: DateTime<Utc>,
    /// Length in minutes
    pub duration_minutes: u32,
    /// Whether other players may join
    #[serde(default)]
    pub is_open_match: bool,
    /// Capacity of an open match
    pub max_participants: Option<u32>,
}

impl From<CreateBookingRequest> for CreateBooking {
    fn from(request: CreateBookingRequest) -> Self {
        Self {
            court_id: request.court_id,
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            is_open_match: request.is_open_match,
            max_participants: request.max_participants,
        }
    }
}

/// Reserve a court.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "X-User-Id: 6f1c..." \
///   -H "Content-Type: application/json" \
///   -d '{"courtId":"...","startTime":"2030-06-11T08:00:00Z","durationMinutes":90,"isOpenMatch":false}'
/// ```
///
/// # Errors
///
/// 400 on validation failures or a taken slot, 404 for an unknown court.
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(request) = payload?;
    let booking = state.service.create_booking(user, request.into()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// The caller's bookings that have not ended, as owner or participant.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn my_bookings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserBooking>>, AppError> {
    Ok(Json(state.service.my_bookings(user).await?))
}

/// Cancel one of the caller's bookings.
///
/// # Errors
///
/// 403 if someone else owns it, 404 if it is missing or already cancelled.
pub async fn cancel_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<BookingId>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.service.cancel_booking(user, id).await?))
}
