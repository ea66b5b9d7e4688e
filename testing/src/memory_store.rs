//! In-memory [`Store`] for fast, deterministic tests.
//!
//! A transaction takes the store-wide lock and works on a private copy of
//! the tables; `commit` swaps the copy in, dropping discards it. Every
//! transaction is therefore fully serialized, which is a strict superset of
//! the row leases the trait promises.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use courtside_core::StorageError;
use courtside_core::schedule::ScheduledBooking;
use courtside_core::store::{Store, StoreResult, Transaction};
use courtside_core::types::{
    BlockedPeriod, BlockedPeriodId, Booking, BookingId, BookingStatus, Court, CourtId,
    InstanceSettings, MatchParticipant, OpenMatchSummary, ParticipationType, UserBooking,
    UserContact, UserId, WaitingListEntry, WaitlistEntryId, WaitlistStatus, player_count,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    courts: Vec<Court>,
    users: HashMap<UserId, UserContact>,
    bookings: Vec<Booking>,
    participants: Vec<MatchParticipant>,
    blocks: Vec<BlockedPeriod>,
    waitlist: Vec<WaitingListEntry>,
    settings: HashMap<String, String>,
}

impl Tables {
    fn court(&self, id: CourtId) -> Option<&Court> {
        self.courts.iter().find(|c| c.id == id)
    }

    fn booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    fn booking_mut(&mut self, id: BookingId) -> StoreResult<&mut Booking> {
        self.bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StorageError::Database(format!("booking {id} does not exist")))
    }

    fn roster(&self, booking: BookingId) -> Vec<MatchParticipant> {
        let mut rows: Vec<MatchParticipant> = self
            .participants
            .iter()
            .filter(|p| p.booking_id == booking)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.joined_at);
        rows
    }

    fn has_conflict(&self, court: CourtId, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.bookings.iter().any(|b| {
            b.court_id == court && b.status == BookingStatus::Confirmed && b.overlaps(start, end)
        }) || self
            .blocks
            .iter()
            .any(|b| b.court_id == court && b.overlaps(start, end))
    }

    fn court_name(&self, id: CourtId) -> String {
        self.court(id).map(|c| c.name.clone()).unwrap_or_default()
    }
}

/// Transactional in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active court
    pub async fn add_court(&self, name: &str) -> Court {
        let court = Court {
            id: CourtId::new(),
            name: name.to_string(),
            is_active: true,
        };
        self.tables.lock().await.courts.push(court.clone());
        court
    }

    /// Flip a court's active flag
    pub async fn set_court_active(&self, id: CourtId, active: bool) {
        let mut tables = self.tables.lock().await;
        if let Some(court) = tables.courts.iter_mut().find(|c| c.id == id) {
            court.is_active = active;
        }
    }

    /// Register a user's contact details
    pub async fn add_user(&self, name: &str, email: &str) -> UserId {
        let id = UserId::new();
        self.tables.lock().await.users.insert(
            id,
            UserContact {
                id,
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        id
    }

    /// Block a court for `[start, end)`
    pub async fn add_block(
        &self,
        court: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: Option<&str>,
    ) -> BlockedPeriod {
        let block = BlockedPeriod {
            id: BlockedPeriodId::new(),
            court_id: court,
            start_time: start,
            end_time: end,
            reason: reason.map(str::to_string),
            is_full_day: false,
        };
        self.tables.lock().await.blocks.push(block.clone());
        block
    }

    /// Set a raw instance setting
    pub async fn set_setting(&self, key: &str, value: &str) {
        self.tables
            .lock()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
    }

    /// Current state of a booking
    pub async fn get_booking(&self, id: BookingId) -> Option<Booking> {
        self.tables.lock().await.booking(id).cloned()
    }

    /// All bookings
    pub async fn bookings(&self) -> Vec<Booking> {
        self.tables.lock().await.bookings.clone()
    }

    /// Participant rows of a booking, oldest first
    pub async fn roster(&self, booking: BookingId) -> Vec<MatchParticipant> {
        self.tables.lock().await.roster(booking)
    }

    /// Current state of a waitlist entry
    pub async fn waitlist_entry(&self, id: WaitlistEntryId) -> Option<WaitingListEntry> {
        self.tables
            .lock()
            .await
            .waitlist
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// All waitlist entries, in insertion order
    pub async fn waitlist(&self) -> Vec<WaitingListEntry> {
        self.tables.lock().await.waitlist.clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn settings(&self) -> StoreResult<InstanceSettings> {
        Ok(InstanceSettings::from_pairs(&self.tables.lock().await.settings))
    }

    async fn active_courts(&self) -> StoreResult<Vec<Court>> {
        let mut courts: Vec<Court> = self
            .tables
            .lock()
            .await
            .courts
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        courts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courts)
    }

    async fn court(&self, id: CourtId) -> StoreResult<Option<Court>> {
        Ok(self.tables.lock().await.court(id).cloned())
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.tables.lock().await.booking(id).cloned())
    }

    async fn participants(&self, booking: BookingId) -> StoreResult<Vec<MatchParticipant>> {
        Ok(self.tables.lock().await.roster(booking))
    }

    async fn schedule_window(
        &self,
        court: CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<(Vec<ScheduledBooking>, Vec<BlockedPeriod>)> {
        let tables = self.tables.lock().await;
        let bookings = tables
            .bookings
            .iter()
            .filter(|b| {
                b.court_id == court && b.status == BookingStatus::Confirmed && b.overlaps(from, to)
            })
            .map(|b| ScheduledBooking {
                booking: b.clone(),
                participants: tables.roster(b.id),
            })
            .collect();
        let blocks = tables
            .blocks
            .iter()
            .filter(|b| b.court_id == court && b.overlaps(from, to))
            .cloned()
            .collect();
        Ok((bookings, blocks))
    }

    async fn user_bookings(&self, user: UserId, now: DateTime<Utc>) -> StoreResult<Vec<UserBooking>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<UserBooking> = tables
            .bookings
            .iter()
            .filter(|b| b.is_active_at(now))
            .filter_map(|b| {
                let participation_type = if b.user_id == user {
                    ParticipationType::Owner
                } else if tables
                    .participants
                    .iter()
                    .any(|p| p.booking_id == b.id && p.user_id == user)
                {
                    ParticipationType::Participant
                } else {
                    return None;
                };
                Some(UserBooking {
                    booking: b.clone(),
                    court_name: tables.court_name(b.court_id),
                    participation_type,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.booking.start_time);
        Ok(rows)
    }

    async fn open_matches(&self, now: DateTime<Utc>) -> StoreResult<Vec<OpenMatchSummary>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<OpenMatchSummary> = tables
            .bookings
            .iter()
            .filter(|b| b.is_open_match && b.is_active_at(now))
            .map(|b| OpenMatchSummary {
                booking: b.clone(),
                court_name: tables.court_name(b.court_id),
                current_participants: player_count(b.user_id, &tables.roster(b.id)),
            })
            .collect();
        rows.sort_by_key(|r| r.booking.start_time);
        Ok(rows)
    }

    async fn open_matches_due(
        &self,
        now: DateTime<Utc>,
        default_lead_hours: u32,
    ) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let mut due: Vec<Booking> = tables
            .bookings
            .iter()
            .filter(|b| {
                let lead = Duration::hours(i64::from(
                    b.auto_cancel_hours_before.unwrap_or(default_lead_hours),
                ));
                b.is_open_match
                    && b.status == BookingStatus::Confirmed
                    && b.start_time > now
                    && b.start_time - now <= lead
            })
            .cloned()
            .collect();
        due.sort_by_key(|b| b.start_time);
        Ok(due)
    }

    async fn user_contact(&self, user: UserId) -> StoreResult<Option<UserContact>> {
        Ok(self.tables.lock().await.users.get(&user).cloned())
    }

    async fn waitlist_entry_by_token(&self, token: &str) -> StoreResult<Option<WaitingListEntry>> {
        Ok(self
            .tables
            .lock()
            .await
            .waitlist
            .iter()
            .find(|e| e.confirmation_token.as_deref() == Some(token))
            .cloned())
    }

    async fn expired_notifications(&self, now: DateTime<Utc>) -> StoreResult<Vec<WaitingListEntry>> {
        Ok(self
            .tables
            .lock()
            .await
            .waitlist
            .iter()
            .filter(|e| {
                e.status == WaitlistStatus::Notified
                    && e.notification_expires_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

/// Transaction over [`InMemoryStore`].
struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_user(&mut self, _id: UserId) -> StoreResult<()> {
        Ok(())
    }

    async fn lock_court(&mut self, id: CourtId) -> StoreResult<Option<Court>> {
        Ok(self.working.court(id).cloned())
    }

    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.working.booking(id).cloned())
    }

    async fn has_active_owned_booking(&mut self, user: UserId, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .working
            .bookings
            .iter()
            .any(|b| b.user_id == user && b.is_active_at(now)))
    }

    async fn has_conflict(
        &mut self,
        court: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self.working.has_conflict(court, start, end))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        // Mirrors the exclusion constraint of the relational schema.
        if booking.status == BookingStatus::Confirmed
            && self.working.bookings.iter().any(|b| {
                b.court_id == booking.court_id
                    && b.status == BookingStatus::Confirmed
                    && b.overlaps(booking.start_time, booking.end_time)
            })
        {
            return Err(StorageError::Conflict("bookings_no_overlap".to_string()));
        }
        self.working.bookings.push(booking.clone());
        Ok(())
    }

    async fn set_booking_status(&mut self, id: BookingId, status: BookingStatus) -> StoreResult<()> {
        self.working.booking_mut(id)?.status = status;
        Ok(())
    }

    async fn set_booking_owner(&mut self, id: BookingId, user: UserId) -> StoreResult<()> {
        self.working.booking_mut(id)?.user_id = user;
        Ok(())
    }

    async fn participants(&mut self, booking: BookingId) -> StoreResult<Vec<MatchParticipant>> {
        Ok(self.working.roster(booking))
    }

    async fn insert_participant(&mut self, participant: &MatchParticipant) -> StoreResult<()> {
        if self
            .working
            .participants
            .iter()
            .any(|p| p.booking_id == participant.booking_id && p.user_id == participant.user_id)
        {
            return Err(StorageError::Conflict("match_participants_pkey".to_string()));
        }
        self.working.participants.push(participant.clone());
        Ok(())
    }

    async fn delete_participant(&mut self, booking: BookingId, user: UserId) -> StoreResult<bool> {
        let before = self.working.participants.len();
        self.working
            .participants
            .retain(|p| !(p.booking_id == booking && p.user_id == user));
        Ok(self.working.participants.len() < before)
    }

    async fn slot_booking(
        &mut self,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<Option<Booking>> {
        Ok(self
            .working
            .bookings
            .iter()
            .find(|b| {
                b.court_id == court
                    && b.status == BookingStatus::Confirmed
                    && b.start_time == slot_start
            })
            .cloned())
    }

    async fn has_waiting_entry(
        &mut self,
        user: UserId,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self.working.waitlist.iter().any(|e| {
            e.user_id == user
                && e.court_id == court
                && e.slot_start_time == slot_start
                && e.status == WaitlistStatus::Waiting
        }))
    }

    async fn has_notified_entry(&mut self, court: CourtId, slot_start: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.working.waitlist.iter().any(|e| {
            e.court_id == court
                && e.slot_start_time == slot_start
                && e.status == WaitlistStatus::Notified
        }))
    }

    async fn next_waiting(
        &mut self,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<Option<WaitingListEntry>> {
        // min_by_key keeps the first of equal keys, so ties fall back to insertion order.
        Ok(self
            .working
            .waitlist
            .iter()
            .filter(|e| {
                e.court_id == court
                    && e.slot_start_time == slot_start
                    && e.status == WaitlistStatus::Waiting
            })
            .min_by_key(|e| e.requested_at)
            .cloned())
    }

    async fn lock_waitlist_entry(&mut self, id: WaitlistEntryId) -> StoreResult<Option<WaitingListEntry>> {
        Ok(self.working.waitlist.iter().find(|e| e.id == id).cloned())
    }

    async fn insert_waitlist_entry(&mut self, entry: &WaitingListEntry) -> StoreResult<()> {
        self.working.waitlist.push(entry.clone());
        Ok(())
    }

    async fn update_waitlist_entry(&mut self, entry: &WaitingListEntry) -> StoreResult<()> {
        let slot = self
            .working
            .waitlist
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| StorageError::Database(format!("waitlist entry {} does not exist", entry.id)))?;
        *slot = entry.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
