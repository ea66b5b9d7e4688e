//! Application state for Axum handlers.

use crate::events::BroadcastPublisher;
use courtside_core::Courtside;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: the service and the publisher are handles.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Booking, match and waitlist operations
    pub service: Courtside,
    /// Push channel the service publishes to
    pub events: BroadcastPublisher,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(service: Courtside, events: BroadcastPublisher) -> Self {
        Self { service, events }
    }
}
