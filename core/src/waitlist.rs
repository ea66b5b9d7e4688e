//! Waitlist Pipeline.
//!
//! Entries move `waiting → notified → {confirmed | expired}`. At most one
//! entry per `(court, slot_start)` holds an offer at a time: promotion runs
//! under the court lease and refuses to notify while another offer is
//! outstanding. Waiting entries are offered strictly in `requested_at` order.

use crate::booking::created_event;
use crate::error::{BookingError, Result};
use crate::event::DomainEvent;
use crate::outbox::{self, Outbox};
use crate::service::Courtside;
use crate::store::Transaction;
use crate::types::{
    Booking, BookingId, BookingStatus, CourtId, UserId, WaitingListEntry, WaitlistEntryId,
    WaitlistStatus,
};
use chrono::{DateTime, Duration, Utc};

/// Input of [`Courtside::join_waitlist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinWaitlist {
    /// Court of the occupied slot
    pub court_id: CourtId,
    /// Start of the occupied booking
    pub slot_start_time: DateTime<Utc>,
    /// Requested end
    pub slot_end_time: DateTime<Utc>,
}

impl Courtside {
    /// Register interest in an occupied slot.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for an inverted or past window, a free slot, or the caller's own slot
    /// - [`BookingError::NotFound`] for an unknown court
    /// - [`BookingError::Conflict`] if the caller is already waiting for this slot
    pub async fn join_waitlist(&self, user: UserId, request: JoinWaitlist) -> Result<WaitingListEntry> {
        let now = self.now();
        if request.slot_end_time <= request.slot_start_time {
            return Err(BookingError::validation("Slot end must be after slot start"));
        }
        if request.slot_start_time <= now {
            return Err(BookingError::validation("Slot has already started"));
        }

        let mut tx = self.store.begin().await?;
        tx.lock_court(request.court_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Court not found"))?;

        let occupying = tx
            .slot_booking(request.court_id, request.slot_start_time)
            .await?
            .ok_or_else(|| {
                BookingError::validation("This slot is free, book it directly instead")
            })?;
        if occupying.user_id == user {
            return Err(BookingError::validation("You already hold this slot"));
        }
        if tx
            .has_waiting_entry(user, request.court_id, request.slot_start_time)
            .await?
        {
            return Err(BookingError::conflict("You are already on the waiting list for this slot"));
        }

        let entry = WaitingListEntry {
            id: WaitlistEntryId::new(),
            court_id: request.court_id,
            user_id: user,
            slot_start_time: request.slot_start_time,
            slot_end_time: request.slot_end_time,
            status: WaitlistStatus::Waiting,
            requested_at: now,
            confirmation_token: None,
            notification_sent_at: None,
            notification_expires_at: None,
        };
        tx.insert_waitlist_entry(&entry).await?;

        let mut out = Outbox::default();
        out.event(DomainEvent::WaitlistJoined {
            entry_id: entry.id,
            court_id: entry.court_id,
            user_id: user,
            slot_start_time: entry.slot_start_time,
        });
        self.finish(tx, out).await?;

        tracing::info!(entry_id = %entry.id, court_id = %entry.court_id, user_id = %user, "Joined waiting list");
        Ok(entry)
    }

    /// Offer a freed slot to the oldest waiting entry.
    ///
    /// No-op if the slot has started, if an offer is already outstanding, or
    /// if the candidate's window is still occupied (it keeps waiting).
    /// Returns the notified entry.
    pub(crate) async fn promote_next(
        &self,
        tx: &mut dyn Transaction,
        court: CourtId,
        slot_start: DateTime<Utc>,
        out: &mut Outbox,
    ) -> Result<Option<WaitingListEntry>> {
        let now = self.now();
        if slot_start <= now {
            return Ok(None);
        }

        tx.lock_court(court).await?;
        if tx.has_notified_entry(court, slot_start).await? {
            tracing::debug!(court_id = %court, %slot_start, "Offer already outstanding");
            return Ok(None);
        }
        let Some(mut entry) = tx.next_waiting(court, slot_start).await? else {
            return Ok(None);
        };
        if tx
            .has_conflict(court, entry.slot_start_time, entry.slot_end_time)
            .await?
        {
            tracing::debug!(entry_id = %entry.id, "Requested window still occupied");
            return Ok(None);
        }

        let token = self.env.tokens.generate();
        let expires_at = now + Duration::minutes(self.policy.waitlist_confirmation_minutes);
        entry.status = WaitlistStatus::Notified;
        entry.confirmation_token = Some(token.clone());
        entry.notification_sent_at = Some(now);
        entry.notification_expires_at = Some(expires_at);
        tx.update_waitlist_entry(&entry).await?;

        out.notice(outbox::waitlist_offer(self.tz, &entry, &token, &self.env.app_url));
        out.event(DomainEvent::WaitlistNotificationSent {
            entry_id: entry.id,
            court_id: court,
            user_id: entry.user_id,
            slot_start_time: slot_start,
            expires_at,
        });

        metrics::counter!("courtside.waitlist.notified").increment(1);
        tracing::info!(entry_id = %entry.id, user_id = %entry.user_id, %expires_at, "Waiting list entry notified");
        Ok(Some(entry))
    }

    /// Redeem a confirmation token for a booking. Public; the token is the credential.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ExpiredOrInvalid`] if the token is unknown, used, or past its deadline
    /// - [`BookingError::Conflict`] if the slot was taken in the meantime (the offer stays open until it lapses)
    pub async fn confirm_from_token(&self, token: &str) -> Result<Booking> {
        let invalid = || {
            BookingError::ExpiredOrInvalid("This confirmation link is invalid or has expired".to_string())
        };
        let now = self.now();
        let found = self
            .store
            .waitlist_entry_by_token(token)
            .await?
            .ok_or_else(invalid)?;

        let mut tx = self.store.begin().await?;
        let court = tx
            .lock_court(found.court_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Court not found"))?;
        let mut entry = tx
            .lock_waitlist_entry(found.id)
            .await?
            .filter(|e| {
                e.status == WaitlistStatus::Notified
                    && e.confirmation_token.as_deref() == Some(token)
                    && e.notification_expires_at.is_some_and(|at| at > now)
                    && e.slot_start_time > now
            })
            .ok_or_else(invalid)?;

        if tx
            .has_conflict(entry.court_id, entry.slot_start_time, entry.slot_end_time)
            .await?
        {
            return Err(BookingError::conflict("Someone booked this slot first"));
        }

        let booking = Booking {
            id: BookingId::new(),
            court_id: entry.court_id,
            user_id: entry.user_id,
            start_time: entry.slot_start_time,
            end_time: entry.slot_end_time,
            status: BookingStatus::Confirmed,
            is_open_match: false,
            max_participants: None,
            auto_cancel_hours_before: None,
            created_at: now,
        };
        tx.insert_booking(&booking).await?;
        entry.status = WaitlistStatus::Confirmed;
        tx.update_waitlist_entry(&entry).await?;

        let mut out = Outbox::default();
        out.event(created_event(&booking));
        out.notice(outbox::booking_confirmed(self.tz, &booking, &court.name));
        self.finish(tx, out).await?;

        metrics::counter!("courtside.waitlist.confirmed").increment(1);
        metrics::counter!("courtside.bookings.created").increment(1);
        tracing::info!(entry_id = %entry.id, booking_id = %booking.id, "Waiting list offer confirmed");
        Ok(booking)
    }

    /// Expire lapsed offers and pass each slot to the next waiting entry.
    ///
    /// Running it again with nothing newly lapsed changes nothing and sends
    /// nothing. Returns how many entries were expired.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the candidate query fails.
    pub async fn sweep_expired_notifications(&self) -> Result<usize> {
        let now = self.now();
        let lapsed = self.store.expired_notifications(now).await?;

        let mut expired = 0;
        for entry in lapsed {
            match self.expire_and_cascade(entry.court_id, entry.id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(entry_id = %entry.id, %error, "Failed to expire waiting list entry");
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired, "Expired waiting list offers");
        }
        Ok(expired)
    }

    async fn expire_and_cascade(
        &self,
        court: CourtId,
        id: WaitlistEntryId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        tx.lock_court(court).await?;
        let Some(mut entry) = tx.lock_waitlist_entry(id).await? else {
            return Ok(false);
        };
        if entry.status != WaitlistStatus::Notified
            || entry.notification_expires_at.is_none_or(|at| at > now)
        {
            return Ok(false);
        }

        entry.status = WaitlistStatus::Expired;
        tx.update_waitlist_entry(&entry).await?;

        let mut out = Outbox::default();
        self.promote_next(tx.as_mut(), entry.court_id, entry.slot_start_time, &mut out)
            .await?;
        self.finish(tx, out).await?;

        metrics::counter!("courtside.waitlist.expired").increment(1);
        tracing::info!(entry_id = %id, user_id = %entry.user_id, "Waiting list offer expired");
        Ok(true)
    }
}
