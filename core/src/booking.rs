//! Booking Lifecycle Manager, plus the read-side views built on the Slot Model.

use crate::error::{BookingError, Result};
use crate::event::DomainEvent;
use crate::outbox::{self, Outbox};
use crate::schedule::{self, ScheduleContext, Slot, WeekSchedule};
use crate::service::Courtside;
use crate::store::Transaction;
use crate::types::{
    Booking, BookingId, BookingStatus, Court, CourtId, MatchParticipant, UserBooking, UserId,
};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

/// Input of [`Courtside::create_booking`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBooking {
    /// Court to reserve
    pub court_id: CourtId,
    /// Requested start
    pub start_time: DateTime<Utc>,
    /// Length in minutes
    pub duration_minutes: u32,
    /// Whether others may join
    pub is_open_match: bool,
    /// Capacity, required for open matches
    pub max_participants: Option<u32>,
}

impl Courtside {
    /// Active courts ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on persistence failure.
    pub async fn courts(&self) -> Result<Vec<Court>> {
        Ok(self.store.active_courts().await?)
    }

    /// Reserve a court.
    ///
    /// Private bookings are limited to one active booking per owner; open
    /// matches are exempt. The conflict check runs under the court lease so
    /// two requests for the same slot cannot both succeed.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for past or out-of-hours starts, bad durations or capacities
    /// - [`BookingError::NotFound`] if the court does not exist
    /// - [`BookingError::Conflict`] if the slot is taken or the user already holds an active booking
    pub async fn create_booking(&self, user: UserId, request: CreateBooking) -> Result<Booking> {
        let now = self.now();
        let settings = self.store.settings().await?;
        let max_participants = self.validate_create(&request, now, settings.booking_advance_days)?;
        let end_time = request.start_time + Duration::minutes(i64::from(request.duration_minutes));

        let day = request.start_time.with_timezone(&self.tz).date_naive();
        let within_hours = schedule::operating_window(self.tz, day, &settings)
            .is_some_and(|(open, close)| request.start_time >= open && end_time <= close);
        if !within_hours {
            return Err(BookingError::validation("Booking must fall within operating hours"));
        }

        let mut tx = self.store.begin().await?;
        tx.lock_user(user).await?;
        let court = tx
            .lock_court(request.court_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Court not found"))?;
        if !court.is_active {
            return Err(BookingError::validation("Court is not available for booking"));
        }

        if !request.is_open_match && tx.has_active_owned_booking(user, now).await? {
            return Err(BookingError::conflict("You already have an active booking"));
        }
        if tx.has_conflict(court.id, request.start_time, end_time).await? {
            return Err(BookingError::conflict("Slot is no longer available"));
        }

        let booking = Booking {
            id: BookingId::new(),
            court_id: court.id,
            user_id: user,
            start_time: request.start_time,
            end_time,
            status: BookingStatus::Confirmed,
            is_open_match: request.is_open_match,
            max_participants,
            auto_cancel_hours_before: request
                .is_open_match
                .then_some(self.policy.auto_cancel_hours_before),
            created_at: now,
        };
        tx.insert_booking(&booking).await?;
        if booking.is_open_match {
            tx.insert_participant(&MatchParticipant {
                booking_id: booking.id,
                user_id: user,
                joined_at: now,
            })
            .await?;
        }

        let mut out = Outbox::default();
        out.event(created_event(&booking));
        out.notice(outbox::booking_confirmed(self.tz, &booking, &court.name));
        self.finish(tx, out).await?;

        metrics::counter!("courtside.bookings.created").increment(1);
        tracing::info!(
            booking_id = %booking.id,
            court_id = %booking.court_id,
            user_id = %user,
            open_match = booking.is_open_match,
            "Booking created"
        );
        Ok(booking)
    }

    fn validate_create(
        &self,
        request: &CreateBooking,
        now: DateTime<Utc>,
        advance_days: u32,
    ) -> Result<Option<u32>> {
        if request.start_time <= now {
            return Err(BookingError::validation("Start time must be in the future"));
        }
        if request.start_time > now + Duration::days(i64::from(advance_days)) {
            return Err(BookingError::validation(format!(
                "Bookings can be made at most {advance_days} days in advance"
            )));
        }

        let local = request.start_time.with_timezone(&self.tz);
        if local.minute() % 30 != 0 || local.second() != 0 || local.nanosecond() != 0 {
            return Err(BookingError::validation("Start time must be on a half-hour boundary"));
        }

        let minutes = i64::from(request.duration_minutes);
        if minutes == 0 || minutes % schedule::SLOT_MINUTES != 0 || minutes > self.policy.max_duration_minutes {
            return Err(BookingError::validation(format!(
                "Duration must be a multiple of {} minutes up to {}",
                schedule::SLOT_MINUTES,
                self.policy.max_duration_minutes
            )));
        }

        if !request.is_open_match {
            return Ok(None);
        }
        match request.max_participants {
            Some(max) if (self.policy.min_participants..=self.policy.max_participants).contains(&max) => {
                Ok(Some(max))
            }
            Some(_) => Err(BookingError::validation(format!(
                "Open matches take between {} and {} players",
                self.policy.min_participants, self.policy.max_participants
            ))),
            None => Err(BookingError::validation("maxParticipants is required for open matches")),
        }
    }

    /// Cancel the caller's own booking and offer the slot to the waitlist.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the booking does not exist or is no longer confirmed
    /// - [`BookingError::Forbidden`] if the caller does not own it
    pub async fn cancel_booking(&self, user: UserId, id: BookingId) -> Result<Booking> {
        let mut tx = self.store.begin().await?;
        let mut booking = tx
            .lock_booking(id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking not found"))?;
        if booking.user_id != user {
            return Err(BookingError::forbidden("You can only cancel your own bookings"));
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::not_found("No active booking to cancel"));
        }

        let others: Vec<UserId> = if booking.is_open_match {
            tx.participants(id)
                .await?
                .into_iter()
                .map(|p| p.user_id)
                .filter(|&u| u != user)
                .collect()
        } else {
            Vec::new()
        };

        let mut out = Outbox::default();
        self.cancel_in_tx(
            tx.as_mut(),
            &booking,
            BookingStatus::CancelledByUser,
            &others,
            "the organizer cancelled it",
            &mut out,
        )
        .await?;
        self.finish(tx, out).await?;

        booking.status = BookingStatus::CancelledByUser;
        metrics::counter!("courtside.bookings.cancelled").increment(1);
        tracing::info!(booking_id = %id, user_id = %user, "Booking cancelled");
        Ok(booking)
    }

    /// Move a leased booking out of `confirmed`, queue the events, notify
    /// `notify` and offer the freed window to the waitlist.
    pub(crate) async fn cancel_in_tx(
        &self,
        tx: &mut dyn Transaction,
        booking: &Booking,
        status: BookingStatus,
        notify: &[UserId],
        reason: &str,
        out: &mut Outbox,
    ) -> Result<()> {
        tx.set_booking_status(booking.id, status).await?;

        out.event(DomainEvent::BookingCancelled {
            booking_id: booking.id,
            court_id: booking.court_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
        });
        if booking.is_open_match {
            for &recipient in notify {
                out.notice(outbox::match_cancelled(self.tz, booking, recipient, reason));
            }
        }

        self.promote_next(tx, booking.court_id, booking.start_time, out)
            .await?;
        Ok(())
    }

    /// The caller's active bookings, as owner or participant.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on persistence failure.
    pub async fn my_bookings(&self, user: UserId) -> Result<Vec<UserBooking>> {
        Ok(self.store.user_bookings(user, self.now()).await?)
    }

    /// Slots of one local day.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown court.
    pub async fn day_schedule(
        &self,
        court: CourtId,
        date: NaiveDate,
        viewer: Option<UserId>,
    ) -> Result<Vec<Slot>> {
        self.render(court, date, date, viewer, |ctx| schedule::day_slots(ctx, date))
            .await
    }

    /// Slots of the Monday-to-Sunday week containing `date`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown court.
    pub async fn week_schedule(
        &self,
        court: CourtId,
        date: NaiveDate,
        viewer: Option<UserId>,
    ) -> Result<WeekSchedule> {
        let (monday, sunday) = schedule::week_bounds(date);
        self.render(court, monday, sunday, viewer, |ctx| {
            schedule::week_schedule(ctx, date)
        })
        .await
    }

    async fn render<T>(
        &self,
        court: CourtId,
        first: NaiveDate,
        last: NaiveDate,
        viewer: Option<UserId>,
        build: impl FnOnce(&ScheduleContext<'_>) -> T + Send,
    ) -> Result<T> {
        if self.store.court(court).await?.is_none() {
            return Err(BookingError::not_found("Court not found"));
        }
        let settings = self.store.settings().await?;
        let (from, to) = schedule::utc_range(self.tz, first, last);
        let (bookings, blocks) = self.store.schedule_window(court, from, to).await?;

        let ctx = ScheduleContext {
            tz: self.tz,
            settings: &settings,
            bookings: &bookings,
            blocks: &blocks,
            viewer,
            now: self.now(),
        };
        Ok(build(&ctx))
    }
}

pub(crate) fn created_event(booking: &Booking) -> DomainEvent {
    DomainEvent::BookingCreated {
        booking_id: booking.id,
        court_id: booking.court_id,
        user_id: booking.user_id,
        start_time: booking.start_time,
        end_time: booking.end_time,
        is_open_match: booking.is_open_match,
    }
}
