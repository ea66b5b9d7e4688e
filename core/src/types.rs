//! Domain types for the Courtside booking service.
//!
//! Courts, bookings, open-match participants, blocked periods and waitlist
//! entries, plus the typed view over the instance settings table.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a court
    CourtId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a user (issued by the auth layer)
    UserId
);
uuid_id!(
    /// Unique identifier for an admin-declared blocked period
    BlockedPeriodId
);
uuid_id!(
    /// Unique identifier for a waitlist entry
    WaitlistEntryId
);

// ============================================================================
// Courts
// ============================================================================

/// A bookable padel court.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    /// Court ID
    pub id: CourtId,
    /// Display name
    pub name: String,
    /// Inactive courts accept no new bookings; existing ones are kept
    pub is_active: bool,
}

// ============================================================================
// Bookings
// ============================================================================

/// Lifecycle status of a booking. Bookings are never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Holds the court
    Confirmed,
    /// Cancelled by its owner
    CancelledByUser,
    /// Cancelled by the system (open-match rules, sweeps) or an admin
    CancelledByAdmin,
}

impl BookingStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::CancelledByUser => "cancelled_by_user",
            Self::CancelledByAdmin => "cancelled_by_admin",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Self::Confirmed),
            "cancelled_by_user" => Some(Self::CancelledByUser),
            "cancelled_by_admin" => Some(Self::CancelledByAdmin),
            _ => None,
        }
    }
}

/// A court reservation, private or open match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID
    pub id: BookingId,
    /// Reserved court
    pub court_id: CourtId,
    /// Owning user; the organizer for open matches
    pub user_id: UserId,
    /// Inclusive start
    pub start_time: DateTime<Utc>,
    /// Exclusive end
    pub end_time: DateTime<Utc>,
    /// Current status
    pub status: BookingStatus,
    /// Whether other users may join
    pub is_open_match: bool,
    /// Capacity, only for open matches
    pub max_participants: Option<u32>,
    /// Lead time under which any departure voids the match
    pub auto_cancel_hours_before: Option<u32>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Whether `[start, end)` intersects this booking.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end_time && end > self.start_time
    }

    /// Confirmed and not yet ended at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Confirmed && self.end_time > now
    }
}

/// A player who joined an open match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchParticipant {
    /// The open match
    pub booking_id: BookingId,
    /// The player
    pub user_id: UserId,
    /// Join time, used for organizer succession
    pub joined_at: DateTime<Utc>,
}

/// Number of distinct players in an open match.
///
/// The organizer always counts, whether or not a participant row exists for them.
#[must_use]
pub fn player_count(organizer: UserId, participants: &[MatchParticipant]) -> u32 {
    let rows = u32::try_from(participants.len()).unwrap_or(u32::MAX);
    if participants.iter().any(|p| p.user_id == organizer) {
        rows
    } else {
        rows.saturating_add(1)
    }
}

/// How the caller relates to one of their active bookings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationType {
    /// Caller owns the booking
    Owner,
    /// Caller joined someone else's open match
    Participant,
}

/// An active booking as listed for its owner or a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBooking {
    /// The booking
    pub booking: Booking,
    /// Court name for display
    pub court_name: String,
    /// Caller's role
    pub participation_type: ParticipationType,
}

/// Listing row for a joinable open match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMatchSummary {
    /// The booking
    pub booking: Booking,
    /// Court name for display
    pub court_name: String,
    /// Current player count (organizer included)
    pub current_participants: u32,
}

// ============================================================================
// Blocked periods
// ============================================================================

/// Admin-imposed unavailability. Conflicts like a booking; has no participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPeriod {
    /// Blocked period ID
    pub id: BlockedPeriodId,
    /// Blocked court
    pub court_id: CourtId,
    /// Inclusive start
    pub start_time: DateTime<Utc>,
    /// Exclusive end
    pub end_time: DateTime<Utc>,
    /// Reason shown on the schedule
    pub reason: Option<String>,
    /// Whether the admin blocked the whole day
    pub is_full_day: bool,
}

impl BlockedPeriod {
    /// Whether `[start, end)` intersects this block.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end_time && end > self.start_time
    }
}

// ============================================================================
// Waitlist
// ============================================================================

/// Waitlist entry lifecycle: `waiting → notified → {confirmed | expired}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    /// Queued, FIFO by `requested_at`
    Waiting,
    /// Offered the slot, holds a token until expiry
    Notified,
    /// Consumed into a booking (terminal)
    Confirmed,
    /// Offer lapsed (terminal)
    Expired,
}

impl WaitlistStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Notified => "notified",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "notified" => Some(Self::Notified),
            "confirmed" => Some(Self::Confirmed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A standing request for an occupied slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingListEntry {
    /// Entry ID
    pub id: WaitlistEntryId,
    /// Requested court
    pub court_id: CourtId,
    /// Waiting user
    pub user_id: UserId,
    /// Requested slot start (slot identity together with the court)
    pub slot_start_time: DateTime<Utc>,
    /// Requested slot end
    pub slot_end_time: DateTime<Utc>,
    /// Current status
    pub status: WaitlistStatus,
    /// FIFO key
    pub requested_at: DateTime<Utc>,
    /// Single-use token, set when notified
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    /// When the offer was sent
    pub notification_sent_at: Option<DateTime<Utc>>,
    /// When the offer lapses
    pub notification_expires_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Users
// ============================================================================

/// Where to send a user's notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContact {
    /// User ID
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

// ============================================================================
// Instance settings
// ============================================================================

/// Settings keys understood by the core.
pub mod settings_keys {
    /// Opening time, `HH:MM`
    pub const OPEN_TIME: &str = "operating_open_time";
    /// Closing time, `HH:MM`
    pub const CLOSE_TIME: &str = "operating_close_time";
    /// How many days ahead bookings may start
    pub const ADVANCE_DAYS: &str = "booking_advance_days";
    /// Hide durations that leave unbookable fragments
    pub const GAP_OPTIMIZATION: &str = "enable_booking_gap_optimization";
}

/// Typed view over the `instance_settings` key-value table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceSettings {
    /// First slot start of each day (local time)
    pub open_time: NaiveTime,
    /// End of the last slot of each day (local time)
    pub close_time: NaiveTime,
    /// Booking horizon in days
    pub booking_advance_days: u32,
    /// Gap optimisation flag
    pub gap_optimization: bool,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            open_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            booking_advance_days: 7,
            gap_optimization: false,
        }
    }
}

impl InstanceSettings {
    /// Build from raw key-value rows. Missing or malformed values keep their defaults.
    #[must_use]
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let mut settings = Self::default();

        if let Some(raw) = pairs.get(settings_keys::OPEN_TIME) {
            match parse_hhmm(raw) {
                Some(t) => settings.open_time = t,
                None => tracing::warn!(key = settings_keys::OPEN_TIME, value = %raw, "Ignoring malformed setting"),
            }
        }
        if let Some(raw) = pairs.get(settings_keys::CLOSE_TIME) {
            match parse_hhmm(raw) {
                Some(t) => settings.close_time = t,
                None => tracing::warn!(key = settings_keys::CLOSE_TIME, value = %raw, "Ignoring malformed setting"),
            }
        }
        if let Some(raw) = pairs.get(settings_keys::ADVANCE_DAYS) {
            match raw.trim().parse() {
                Ok(days) => settings.booking_advance_days = days,
                Err(_) => tracing::warn!(key = settings_keys::ADVANCE_DAYS, value = %raw, "Ignoring malformed setting"),
            }
        }
        if let Some(raw) = pairs.get(settings_keys::GAP_OPTIMIZATION) {
            settings.gap_optimization = raw.trim().eq_ignore_ascii_case("true");
        }

        settings
    }
}

fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn organizer_without_row_is_counted() {
        let organizer = UserId::new();
        let booking_id = BookingId::new();
        let other = MatchParticipant {
            booking_id,
            user_id: UserId::new(),
            joined_at: Utc::now(),
        };

        assert_eq!(player_count(organizer, &[]), 1);
        assert_eq!(player_count(organizer, std::slice::from_ref(&other)), 2);

        let own_row = MatchParticipant {
            booking_id,
            user_id: organizer,
            joined_at: Utc::now(),
        };
        assert_eq!(player_count(organizer, &[own_row, other]), 2);
    }

    #[test]
    fn settings_fall_back_on_bad_values() {
        let mut pairs = HashMap::new();
        pairs.insert(settings_keys::OPEN_TIME.to_string(), "09:30".to_string());
        pairs.insert(settings_keys::CLOSE_TIME.to_string(), "late".to_string());
        pairs.insert(settings_keys::ADVANCE_DAYS.to_string(), "14".to_string());
        pairs.insert(settings_keys::GAP_OPTIMIZATION.to_string(), "TRUE".to_string());

        let settings = InstanceSettings::from_pairs(&pairs);
        assert_eq!(settings.open_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(settings.close_time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(settings.booking_advance_days, 14);
        assert!(settings.gap_optimization);
    }

    #[test]
    fn status_strings_round_trip_through_parse() {
        for status in [
            BookingStatus::Confirmed,
            BookingStatus::CancelledByUser,
            BookingStatus::CancelledByAdmin,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WaitlistStatus::parse("bogus"), None);
    }
}
