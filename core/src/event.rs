//! Push-channel events.
//!
//! Serialized as `{"type": "booking:created", ...}` with camelCase fields.
//! Payloads carry just enough for clients to re-fetch the affected views.

use crate::types::{BookingId, CourtId, UserId, WaitlistEntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A state change broadcast after commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    /// A booking was created (normal flow or waitlist confirmation)
    #[serde(rename = "booking:created")]
    BookingCreated {
        /// New booking
        booking_id: BookingId,
        /// Court
        court_id: CourtId,
        /// Owner
        user_id: UserId,
        /// Start
        start_time: DateTime<Utc>,
        /// End
        end_time: DateTime<Utc>,
        /// Open match flag
        is_open_match: bool,
    },

    /// A booking left the `confirmed` state
    #[serde(rename = "booking:cancelled")]
    BookingCancelled {
        /// Cancelled booking
        booking_id: BookingId,
        /// Court
        court_id: CourtId,
        /// Start
        start_time: DateTime<Utc>,
        /// End
        end_time: DateTime<Utc>,
    },

    /// Open match roster or ownership changed
    #[serde(rename = "match:updated")]
    MatchUpdated {
        /// Match booking
        booking_id: BookingId,
        /// Court
        court_id: CourtId,
        /// Start
        start_time: DateTime<Utc>,
        /// Current organizer
        organizer_id: UserId,
        /// Player count after the change
        current_participants: u32,
        /// Capacity
        max_participants: u32,
        /// Whether the change cancelled the match
        cancelled: bool,
    },

    /// A waitlist entry was offered its slot
    #[serde(rename = "waitlist:notificationSent")]
    WaitlistNotificationSent {
        /// Notified entry
        entry_id: WaitlistEntryId,
        /// Court
        court_id: CourtId,
        /// Notified user
        user_id: UserId,
        /// Slot start
        slot_start_time: DateTime<Utc>,
        /// Offer deadline
        expires_at: DateTime<Utc>,
    },

    /// A user registered on a waitlist
    #[serde(rename = "waitlist:joined")]
    WaitlistJoined {
        /// New entry
        entry_id: WaitlistEntryId,
        /// Court
        court_id: CourtId,
        /// Waiting user
        user_id: UserId,
        /// Slot start
        slot_start_time: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "booking:created",
            Self::BookingCancelled { .. } => "booking:cancelled",
            Self::MatchUpdated { .. } => "match:updated",
            Self::WaitlistNotificationSent { .. } => "waitlist:notificationSent",
            Self::WaitlistJoined { .. } => "waitlist:joined",
        }
    }

    /// Court the event concerns.
    #[must_use]
    pub const fn court_id(&self) -> CourtId {
        match self {
            Self::BookingCreated { court_id, .. }
            | Self::BookingCancelled { court_id, .. }
            | Self::MatchUpdated { court_id, .. }
            | Self::WaitlistNotificationSent { court_id, .. }
            | Self::WaitlistJoined { court_id, .. } => *court_id,
        }
    }
}
