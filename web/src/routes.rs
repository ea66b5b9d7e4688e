//! Router configuration.

use crate::handlers::{
    bookings, courts,
    health::{health_check, readiness_check},
    matches, schedule, waitlist, websocket,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// Health checks and the push channel live at the root; everything else is
/// nested under `/api`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/courts", get(courts::list))
        // Booking lifecycle
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/me", get(bookings::my_bookings))
        .route("/bookings/:id", delete(bookings::cancel_booking))
        // Slot model views
        .route("/schedule/week", get(schedule::week))
        .route("/schedule/day", get(schedule::day))
        // Open matches
        .route("/matches/open", get(matches::open))
        .route("/matches/:id/join", post(matches::join))
        .route("/matches/:id/leave", delete(matches::leave))
        .route("/matches/:id/participants", get(matches::participants))
        // Waiting list
        .route("/waiting-list", post(waitlist::join))
        .route(
            "/waiting-list/confirm",
            get(waitlist::confirm_link).post(waitlist::confirm),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/ws", get(websocket::handle))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
