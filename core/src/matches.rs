//! Open Match Engine.
//!
//! Join and leave run under the booking lease, so capacity checks and
//! organizer succession always see a consistent roster.

use crate::error::{BookingError, Result};
use crate::event::DomainEvent;
use crate::outbox::{self, Outbox};
use crate::service::Courtside;
use crate::store::Transaction;
use crate::types::{
    Booking, BookingId, BookingStatus, MatchParticipant, OpenMatchSummary, UserId, player_count,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A player of an open match, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayer {
    /// Player
    pub user_id: UserId,
    /// When they joined (creation time for the organizer)
    pub joined_at: DateTime<Utc>,
    /// Whether they currently own the booking
    pub is_organizer: bool,
}

/// Roster after a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    /// Match booking
    pub booking_id: BookingId,
    /// Players after the join
    pub current_participants: u32,
    /// Capacity
    pub max_participants: u32,
}

/// Why a departure cancelled the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Departure inside the auto-cancel lead time
    TooCloseToStart,
    /// Organizer left and nobody remained to take over
    NoPlayersLeft,
    /// Start approached with the roster still short
    Incomplete,
}

impl CancelReason {
    const fn describe(self) -> &'static str {
        match self {
            Self::TooCloseToStart => "a player left too close to the start",
            Self::NoPlayersLeft => "no players remained",
            Self::Incomplete => "not enough players joined in time",
        }
    }
}

/// What a leave did to the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LeaveOutcome {
    /// Caller left, match continues unchanged otherwise
    Left {
        /// Players remaining
        current_participants: u32,
    },
    /// Caller was organizer; the earliest remaining participant took over
    OwnershipTransferred {
        /// New organizer
        new_organizer: UserId,
        /// Players remaining
        current_participants: u32,
    },
    /// The match was cancelled
    Cancelled {
        /// Why
        reason: CancelReason,
    },
}

impl Courtside {
    /// Join an open match.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the booking is missing, cancelled or private
    /// - [`BookingError::Validation`] if the match has started
    /// - [`BookingError::Conflict`] for the organizer, a full match, or a repeat join
    pub async fn join_match(&self, user: UserId, id: BookingId) -> Result<JoinOutcome> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let booking = lock_open_match(tx.as_mut(), id).await?;

        if booking.start_time <= now {
            return Err(BookingError::validation("This match has already started"));
        }
        if booking.user_id == user {
            return Err(BookingError::conflict("You cannot join your own match"));
        }

        let participants = tx.participants(id).await?;
        let max_participants = capacity(&booking);
        if player_count(booking.user_id, &participants) >= max_participants {
            return Err(BookingError::conflict("This match is full"));
        }
        if participants.iter().any(|p| p.user_id == user) {
            return Err(BookingError::conflict("You have already joined this match"));
        }

        tx.insert_participant(&MatchParticipant {
            booking_id: id,
            user_id: user,
            joined_at: now,
        })
        .await?;
        let current_participants = player_count(booking.user_id, &participants).saturating_add(1);

        let mut out = Outbox::default();
        out.event(DomainEvent::MatchUpdated {
            booking_id: id,
            court_id: booking.court_id,
            start_time: booking.start_time,
            organizer_id: booking.user_id,
            current_participants,
            max_participants,
            cancelled: false,
        });
        self.finish(tx, out).await?;

        metrics::counter!("courtside.matches.joined").increment(1);
        tracing::info!(booking_id = %id, user_id = %user, current_participants, "Player joined match");
        Ok(JoinOutcome {
            booking_id: id,
            current_participants,
            max_participants,
        })
    }

    /// Leave an open match.
    ///
    /// Rules, first match wins: inside the auto-cancel lead time any
    /// departure cancels the match; an organizer leaving hands the match to
    /// the earliest-joined remaining player, or cancels it if nobody is
    /// left; anyone else just leaves.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the booking is not an active open match or the caller is not in it
    /// - [`BookingError::Validation`] if the match has started
    pub async fn leave_match(&self, user: UserId, id: BookingId) -> Result<LeaveOutcome> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let booking = lock_open_match(tx.as_mut(), id).await?;

        if booking.start_time <= now {
            return Err(BookingError::validation("This match has already started"));
        }

        let was_organizer = booking.user_id == user;
        let removed = tx.delete_participant(id, user).await?;
        if !removed && !was_organizer {
            return Err(BookingError::not_found("You are not a participant in this match"));
        }

        let remaining: Vec<MatchParticipant> = tx
            .participants(id)
            .await?
            .into_iter()
            .filter(|p| p.user_id != user)
            .collect();
        let lead_time = Duration::hours(i64::from(
            booking
                .auto_cancel_hours_before
                .unwrap_or(self.policy.auto_cancel_hours_before),
        ));

        let mut out = Outbox::default();
        let outcome = if booking.start_time - now <= lead_time {
            LeaveOutcome::Cancelled {
                reason: CancelReason::TooCloseToStart,
            }
        } else if was_organizer {
            match remaining.first() {
                Some(successor) => LeaveOutcome::OwnershipTransferred {
                    new_organizer: successor.user_id,
                    current_participants: player_count(successor.user_id, &remaining),
                },
                None => LeaveOutcome::Cancelled {
                    reason: CancelReason::NoPlayersLeft,
                },
            }
        } else {
            LeaveOutcome::Left {
                current_participants: player_count(booking.user_id, &remaining),
            }
        };

        match &outcome {
            LeaveOutcome::Cancelled { reason } => {
                let mut notify: Vec<UserId> = remaining.iter().map(|p| p.user_id).collect();
                if !was_organizer && !notify.contains(&booking.user_id) {
                    notify.push(booking.user_id);
                }
                self.cancel_in_tx(
                    tx.as_mut(),
                    &booking,
                    BookingStatus::CancelledByAdmin,
                    &notify,
                    reason.describe(),
                    &mut out,
                )
                .await?;
                out.event(match_updated(&booking, booking.user_id, 0, true));
            }
            LeaveOutcome::OwnershipTransferred {
                new_organizer,
                current_participants,
            } => {
                tx.set_booking_owner(id, *new_organizer).await?;
                out.event(match_updated(&booking, *new_organizer, *current_participants, false));
            }
            LeaveOutcome::Left {
                current_participants,
            } => {
                out.event(match_updated(&booking, booking.user_id, *current_participants, false));
            }
        }
        self.finish(tx, out).await?;

        metrics::counter!("courtside.matches.left").increment(1);
        if matches!(outcome, LeaveOutcome::Cancelled { .. }) {
            metrics::counter!("courtside.bookings.cancelled").increment(1);
        }
        tracing::info!(booking_id = %id, user_id = %user, outcome = ?outcome, "Player left match");
        Ok(outcome)
    }

    /// Players of an open match, organizer first, then by join time.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] if the booking is missing or not an open match.
    pub async fn match_participants(&self, id: BookingId) -> Result<Vec<MatchPlayer>> {
        let booking = self
            .store
            .booking(id)
            .await?
            .filter(|b| b.is_open_match)
            .ok_or_else(|| BookingError::not_found("Match not found"))?;
        let participants = self.store.participants(id).await?;

        let organizer_joined = participants
            .iter()
            .find(|p| p.user_id == booking.user_id)
            .map_or(booking.created_at, |p| p.joined_at);
        let mut players = vec![MatchPlayer {
            user_id: booking.user_id,
            joined_at: organizer_joined,
            is_organizer: true,
        }];
        players.extend(
            participants
                .into_iter()
                .filter(|p| p.user_id != booking.user_id)
                .map(|p| MatchPlayer {
                    user_id: p.user_id,
                    joined_at: p.joined_at,
                    is_organizer: false,
                }),
        );
        Ok(players)
    }

    /// Confirmed open matches that have not ended.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on persistence failure.
    pub async fn open_matches(&self) -> Result<Vec<OpenMatchSummary>> {
        Ok(self.store.open_matches(self.now()).await?)
    }

    /// Cancel open matches about to start with an incomplete roster.
    ///
    /// Each match is re-checked and cancelled in its own transaction; a
    /// failure on one match is logged and does not stop the sweep.
    /// Returns how many matches were cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the candidate query fails.
    pub async fn sweep_incomplete_matches(&self) -> Result<usize> {
        let now = self.now();
        let candidates = self
            .store
            .open_matches_due(now, self.policy.auto_cancel_hours_before)
            .await?;

        let mut cancelled = 0;
        for candidate in candidates {
            match self.cancel_if_incomplete(candidate.id, now).await {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(booking_id = %candidate.id, %error, "Incomplete match check failed");
                }
            }
        }

        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled incomplete open matches");
        }
        Ok(cancelled)
    }

    async fn cancel_if_incomplete(&self, id: BookingId, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let Some(booking) = tx.lock_booking(id).await? else {
            return Ok(false);
        };
        let lead_time = Duration::hours(i64::from(
            booking
                .auto_cancel_hours_before
                .unwrap_or(self.policy.auto_cancel_hours_before),
        ));
        if booking.status != BookingStatus::Confirmed
            || !booking.is_open_match
            || booking.start_time <= now
            || booking.start_time - now > lead_time
        {
            return Ok(false);
        }

        let participants = tx.participants(id).await?;
        let current = player_count(booking.user_id, &participants);
        if current >= capacity(&booking) {
            return Ok(false);
        }

        let mut notify: Vec<UserId> = participants.iter().map(|p| p.user_id).collect();
        if !notify.contains(&booking.user_id) {
            notify.push(booking.user_id);
        }

        let mut out = Outbox::default();
        self.cancel_in_tx(
            tx.as_mut(),
            &booking,
            BookingStatus::CancelledByAdmin,
            &notify,
            CancelReason::Incomplete.describe(),
            &mut out,
        )
        .await?;
        out.event(match_updated(&booking, booking.user_id, 0, true));
        self.finish(tx, out).await?;

        metrics::counter!("courtside.bookings.cancelled").increment(1);
        tracing::info!(booking_id = %id, players = current, "Incomplete open match cancelled");
        Ok(true)
    }
}

async fn lock_open_match(tx: &mut dyn Transaction, id: BookingId) -> Result<Booking> {
    let booking = tx
        .lock_booking(id)
        .await?
        .ok_or_else(|| BookingError::not_found("Match not found"))?;
    if !booking.is_open_match || booking.status != BookingStatus::Confirmed {
        return Err(BookingError::not_found("No active open match with this id"));
    }
    Ok(booking)
}

fn capacity(booking: &Booking) -> u32 {
    booking
        .max_participants
        .unwrap_or(crate::schedule::DEFAULT_MATCH_CAPACITY)
}

fn match_updated(
    booking: &Booking,
    organizer: UserId,
    current_participants: u32,
    cancelled: bool,
) -> DomainEvent {
    DomainEvent::MatchUpdated {
        booking_id: booking.id,
        court_id: booking.court_id,
        start_time: booking.start_time,
        organizer_id: organizer,
        current_participants,
        max_participants: capacity(booking),
        cancelled,
    }
}
