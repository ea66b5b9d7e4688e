//! Storage abstraction.
//!
//! [`Store`] serves unlocked reads and opens transactions. A [`Transaction`]
//! is the single-writer boundary every mutation goes through: `lock_*`
//! methods take an exclusive lease on the row for the rest of the
//! transaction, `commit` publishes all writes at once, and dropping an
//! uncommitted transaction discards them.
//!
//! Lease order is user, then booking, then court, then waitlist entry.
//! Every operation acquires leases in that order so concurrent operations
//! cannot deadlock.

use crate::error::StorageError;
use crate::schedule::ScheduledBooking;
use crate::types::{
    BlockedPeriod, Booking, BookingId, BookingStatus, Court, CourtId, InstanceSettings,
    MatchParticipant, OpenMatchSummary, UserBooking, UserContact, UserId, WaitingListEntry,
    WaitlistEntryId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result alias for storage calls.
pub type StoreResult<T> = Result<T, StorageError>;

/// Read side and transaction factory.
#[async_trait]
pub trait Store: Send + Sync {
    /// Current instance settings.
    async fn settings(&self) -> StoreResult<InstanceSettings>;

    /// Active courts ordered by name.
    async fn active_courts(&self) -> StoreResult<Vec<Court>>;

    /// A court by ID, active or not.
    async fn court(&self, id: CourtId) -> StoreResult<Option<Court>>;

    /// A booking by ID.
    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;

    /// Participant rows of a booking, oldest first.
    async fn participants(&self, booking: BookingId) -> StoreResult<Vec<MatchParticipant>>;

    /// Confirmed bookings (with rosters) and blocks on `court` overlapping `[from, to)`.
    async fn schedule_window(
        &self,
        court: CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<(Vec<ScheduledBooking>, Vec<BlockedPeriod>)>;

    /// Confirmed bookings not yet ended that `user` owns or plays in, by start time.
    async fn user_bookings(&self, user: UserId, now: DateTime<Utc>) -> StoreResult<Vec<UserBooking>>;

    /// Confirmed open matches not yet ended, by start time.
    async fn open_matches(&self, now: DateTime<Utc>) -> StoreResult<Vec<OpenMatchSummary>>;

    /// Confirmed open matches that start after `now` but within their own
    /// auto-cancel lead time (`default_lead_hours` when none is stored).
    async fn open_matches_due(
        &self,
        now: DateTime<Utc>,
        default_lead_hours: u32,
    ) -> StoreResult<Vec<Booking>>;

    /// Contact details used to address notifications.
    async fn user_contact(&self, user: UserId) -> StoreResult<Option<UserContact>>;

    /// Waitlist entry holding `token`, in any status.
    async fn waitlist_entry_by_token(&self, token: &str) -> StoreResult<Option<WaitingListEntry>>;

    /// `notified` entries whose offer lapsed at or before `now`.
    async fn expired_notifications(&self, now: DateTime<Utc>) -> StoreResult<Vec<WaitingListEntry>>;

    /// Connectivity check.
    async fn ping(&self) -> StoreResult<()>;

    /// Open a transaction.
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;
}

/// A unit of work holding exclusive leases.
#[async_trait]
pub trait Transaction: Send {
    /// Lease a user. Serializes per-user rules (one active private booking)
    /// across courts.
    async fn lock_user(&mut self, id: UserId) -> StoreResult<()>;

    /// Lease a court. Serializes booking creation and waitlist changes per court.
    async fn lock_court(&mut self, id: CourtId) -> StoreResult<Option<Court>>;

    /// Lease a booking aggregate (the booking row and its roster).
    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>>;

    /// Whether `user` owns a confirmed booking that has not ended at `now`.
    async fn has_active_owned_booking(&mut self, user: UserId, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Whether a confirmed booking or a block on `court` overlaps `[start, end)`.
    async fn has_conflict(
        &mut self,
        court: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Insert a new booking.
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    /// Change a booking's status.
    async fn set_booking_status(&mut self, id: BookingId, status: BookingStatus) -> StoreResult<()>;

    /// Hand a booking to a new organizer.
    async fn set_booking_owner(&mut self, id: BookingId, user: UserId) -> StoreResult<()>;

    /// Participant rows of a leased booking, oldest first.
    async fn participants(&mut self, booking: BookingId) -> StoreResult<Vec<MatchParticipant>>;

    /// Add a participant row.
    async fn insert_participant(&mut self, participant: &MatchParticipant) -> StoreResult<()>;

    /// Remove a participant row. Returns whether a row existed.
    async fn delete_participant(&mut self, booking: BookingId, user: UserId) -> StoreResult<bool>;

    /// Confirmed booking on `court` starting exactly at `slot_start`.
    async fn slot_booking(
        &mut self,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<Option<Booking>>;

    /// Whether `user` already waits for `(court, slot_start)`.
    async fn has_waiting_entry(
        &mut self,
        user: UserId,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Whether some entry for `(court, slot_start)` currently holds an offer.
    async fn has_notified_entry(&mut self, court: CourtId, slot_start: DateTime<Utc>) -> StoreResult<bool>;

    /// Oldest `waiting` entry for `(court, slot_start)`, leased.
    async fn next_waiting(
        &mut self,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<Option<WaitingListEntry>>;

    /// Lease a waitlist entry.
    async fn lock_waitlist_entry(&mut self, id: WaitlistEntryId) -> StoreResult<Option<WaitingListEntry>>;

    /// Insert a new waitlist entry.
    async fn insert_waitlist_entry(&mut self, entry: &WaitingListEntry) -> StoreResult<()>;

    /// Persist status, token and notification timestamps of an entry.
    async fn update_waitlist_entry(&mut self, entry: &WaitingListEntry) -> StoreResult<()>;

    /// Publish every write made in this transaction.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
