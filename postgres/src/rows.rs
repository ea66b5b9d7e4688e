//! Row types and their conversion into domain types.

use chrono::{DateTime, Utc};
use courtside_core::StorageError;
use courtside_core::types::{
    BlockedPeriod, BlockedPeriodId, Booking, BookingId, BookingStatus, Court, CourtId,
    MatchParticipant, UserContact, UserId, WaitingListEntry, WaitlistEntryId, WaitlistStatus,
};
use uuid::Uuid;

pub const BOOKING_COLUMNS: &str = "b.id, b.court_id, b.user_id, b.start_time, b.end_time, \
     b.status, b.is_open_match, b.max_participants, b.auto_cancel_hours_before, b.created_at";

pub const WAITLIST_COLUMNS: &str = "id, court_id, user_id, slot_start_time, slot_end_time, \
     status, requested_at, confirmation_token, notification_sent_at, notification_expires_at";

#[derive(sqlx::FromRow)]
pub struct CourtRow {
    id: Uuid,
    name: String,
    is_active: bool,
}

impl From<CourtRow> for Court {
    fn from(row: CourtRow) -> Self {
        Self {
            id: CourtId::from_uuid(row.id),
            name: row.name,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct BookingRow {
    id: Uuid,
    court_id: Uuid,
    user_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    is_open_match: bool,
    max_participants: Option<i32>,
    auto_cancel_hours_before: Option<i32>,
    created_at: DateTime<Utc>,
}

fn unsigned(column: &str, value: Option<i32>) -> Result<Option<u32>, StorageError> {
    value
        .map(|v| u32::try_from(v).map_err(|_| StorageError::Corrupt(format!("negative {column}: {v}"))))
        .transpose()
}

impl TryFrom<BookingRow> for Booking {
    type Error = StorageError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown booking status: {}", row.status)))?;
        Ok(Self {
            id: BookingId::from_uuid(row.id),
            court_id: CourtId::from_uuid(row.court_id),
            user_id: UserId::from_uuid(row.user_id),
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            is_open_match: row.is_open_match,
            max_participants: unsigned("max_participants", row.max_participants)?,
            auto_cancel_hours_before: unsigned("auto_cancel_hours_before", row.auto_cancel_hours_before)?,
            created_at: row.created_at,
        })
    }
}

/// A booking joined with its court name and caller-specific columns.
#[derive(sqlx::FromRow)]
pub struct ListedBookingRow {
    #[sqlx(flatten)]
    pub booking: BookingRow,
    pub court_name: String,
    pub is_owner: bool,
    pub current_participants: i64,
}

#[derive(sqlx::FromRow)]
pub struct ParticipantRow {
    booking_id: Uuid,
    user_id: Uuid,
    joined_at: DateTime<Utc>,
}

impl From<ParticipantRow> for MatchParticipant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            booking_id: BookingId::from_uuid(row.booking_id),
            user_id: UserId::from_uuid(row.user_id),
            joined_at: row.joined_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct BlockRow {
    id: Uuid,
    court_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    reason: Option<String>,
    is_full_day: bool,
}

impl From<BlockRow> for BlockedPeriod {
    fn from(row: BlockRow) -> Self {
        Self {
            id: BlockedPeriodId::from_uuid(row.id),
            court_id: CourtId::from_uuid(row.court_id),
            start_time: row.start_time,
            end_time: row.end_time,
            reason: row.reason,
            is_full_day: row.is_full_day,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct WaitlistRow {
    id: Uuid,
    court_id: Uuid,
    user_id: Uuid,
    slot_start_time: DateTime<Utc>,
    slot_end_time: DateTime<Utc>,
    status: String,
    requested_at: DateTime<Utc>,
    confirmation_token: Option<String>,
    notification_sent_at: Option<DateTime<Utc>>,
    notification_expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<WaitlistRow> for WaitingListEntry {
    type Error = StorageError;

    fn try_from(row: WaitlistRow) -> Result<Self, Self::Error> {
        let status = WaitlistStatus::parse(&row.status)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown waitlist status: {}", row.status)))?;
        Ok(Self {
            id: WaitlistEntryId::from_uuid(row.id),
            court_id: CourtId::from_uuid(row.court_id),
            user_id: UserId::from_uuid(row.user_id),
            slot_start_time: row.slot_start_time,
            slot_end_time: row.slot_end_time,
            status,
            requested_at: row.requested_at,
            confirmation_token: row.confirmation_token,
            notification_sent_at: row.notification_sent_at,
            notification_expires_at: row.notification_expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ContactRow {
    id: Uuid,
    name: String,
    email: String,
}

impl From<ContactRow> for UserContact {
    fn from(row: ContactRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
        }
    }
}

/// Convert a `u32` into the `INTEGER` column type.
pub fn signed(value: Option<u32>) -> Option<i32> {
    value.map(|v| i32::try_from(v).unwrap_or(i32::MAX))
}

/// Clamp a database count into the domain's `u32`.
pub fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
