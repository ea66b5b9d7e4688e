//! Schedule views.
//!
//! Both views are public; an `X-User-Id` header personalises the slots
//! (the caller's own bookings and joined matches).

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::NaiveDate;
use courtside_core::schedule::{Slot, WeekSchedule};
use courtside_core::types::CourtId;
use serde::Deserialize;

/// Query of both schedule endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    /// Court to render
    pub court_id: CourtId,
    /// Local date (`YYYY-MM-DD`); today when omitted
    pub date: Option<NaiveDate>,
}

/// `GET /api/schedule/week?courtId&date`: the Monday-to-Sunday week containing `date`.
///
/// # Errors
///
/// 400 for a malformed query, 404 for an unknown court.
pub async fn week(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Json<WeekSchedule>, AppError> {
    let Query(query) = query?;
    let date = query.date.unwrap_or_else(|| state.service.today());
    let week = state
        .service
        .week_schedule(query.court_id, date, viewer.map(|v| v.0))
        .await?;
    Ok(Json(week))
}

/// `GET /api/schedule/day?courtId&date`: the slots of one local day.
///
/// # Errors
///
/// 400 for a malformed query, 404 for an unknown court.
pub async fn day(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let Query(query) = query?;
    let date = query.date.unwrap_or_else(|| state.service.today());
    let slots = state
        .service
        .day_schedule(query.court_id, date, viewer.map(|v| v.0))
        .await?;
    Ok(Json(slots))
}
