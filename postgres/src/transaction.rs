//! Leasing transaction.
//!
//! Courts, bookings and waitlist entries are leased with `FOR UPDATE`; users
//! with an advisory lock.

use crate::rows::{
    BOOKING_COLUMNS, BookingRow, CourtRow, ParticipantRow, WAITLIST_COLUMNS, WaitlistRow, signed,
};
use crate::storage_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courtside_core::store::{StoreResult, Transaction};
use courtside_core::types::{
    Booking, BookingId, BookingStatus, Court, CourtId, MatchParticipant, UserId, WaitingListEntry,
    WaitlistEntryId,
};
use sqlx::Postgres;

/// A database transaction holding row and advisory locks.
///
/// Dropping it without calling `commit` rolls back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    pub(crate) const fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

impl std::fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTransaction").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    // Users are owned by the auth layer and may have no row here, so the
    // lease is a transaction-scoped advisory lock keyed on the user ID.
    async fn lock_user(&mut self, id: UserId) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::uuid::text, 0))")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to lock user", e))?;
        Ok(())
    }

    async fn lock_court(&mut self, id: CourtId) -> StoreResult<Option<Court>> {
        let row = sqlx::query_as::<_, CourtRow>(
            "SELECT id, name, is_active FROM courts WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to lock court", e))?;
        Ok(row.map(Court::from))
    }

    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1 FOR UPDATE");
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to lock booking", e))?
            .map(Booking::try_from)
            .transpose()
    }

    async fn has_active_owned_booking(&mut self, user: UserId, now: DateTime<Utc>) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookings \
                            WHERE user_id = $1 AND status = 'confirmed' AND end_time > $2)",
        )
        .bind(user.as_uuid())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to check active bookings", e))
    }

    async fn has_conflict(
        &mut self,
        court: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookings \
                            WHERE court_id = $1 AND status = 'confirmed' \
                              AND start_time < $3 AND end_time > $2) \
                 OR EXISTS (SELECT 1 FROM blocked_periods \
                            WHERE court_id = $1 AND start_time < $3 AND end_time > $2)",
        )
        .bind(court.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to check slot conflicts", e))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bookings (id, court_id, user_id, start_time, end_time, status, \
                                   is_open_match, max_participants, auto_cancel_hours_before, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.court_id.as_uuid())
        .bind(booking.user_id.as_uuid())
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status.as_str())
        .bind(booking.is_open_match)
        .bind(signed(booking.max_participants))
        .bind(signed(booking.auto_cancel_hours_before))
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to insert booking", e))?;
        Ok(())
    }

    async fn set_booking_status(&mut self, id: BookingId, status: BookingStatus) -> StoreResult<()> {
        sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to update booking status", e))?;
        Ok(())
    }

    async fn set_booking_owner(&mut self, id: BookingId, user: UserId) -> StoreResult<()> {
        sqlx::query("UPDATE bookings SET user_id = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to transfer booking", e))?;
        Ok(())
    }

    async fn participants(&mut self, booking: BookingId) -> StoreResult<Vec<MatchParticipant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT booking_id, user_id, joined_at FROM match_participants \
             WHERE booking_id = $1 ORDER BY joined_at, user_id",
        )
        .bind(booking.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to load participants", e))?;
        Ok(rows.into_iter().map(MatchParticipant::from).collect())
    }

    async fn insert_participant(&mut self, participant: &MatchParticipant) -> StoreResult<()> {
        sqlx::query("INSERT INTO match_participants (booking_id, user_id, joined_at) VALUES ($1, $2, $3)")
            .bind(participant.booking_id.as_uuid())
            .bind(participant.user_id.as_uuid())
            .bind(participant.joined_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to add participant", e))?;
        Ok(())
    }

    async fn delete_participant(&mut self, booking: BookingId, user: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM match_participants WHERE booking_id = $1 AND user_id = $2")
            .bind(booking.as_uuid())
            .bind(user.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to remove participant", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn slot_booking(
        &mut self,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b \
             WHERE b.court_id = $1 AND b.start_time = $2 AND b.status = 'confirmed'"
        );
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(court.as_uuid())
            .bind(slot_start)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to load slot booking", e))?
            .map(Booking::try_from)
            .transpose()
    }

    async fn has_waiting_entry(
        &mut self,
        user: UserId,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM waiting_list_entries \
                            WHERE user_id = $1 AND court_id = $2 AND slot_start_time = $3 \
                              AND status = 'waiting')",
        )
        .bind(user.as_uuid())
        .bind(court.as_uuid())
        .bind(slot_start)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to check waitlist registration", e))
    }

    async fn has_notified_entry(&mut self, court: CourtId, slot_start: DateTime<Utc>) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM waiting_list_entries \
                            WHERE court_id = $1 AND slot_start_time = $2 AND status = 'notified')",
        )
        .bind(court.as_uuid())
        .bind(slot_start)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to check outstanding offers", e))
    }

    async fn next_waiting(
        &mut self,
        court: CourtId,
        slot_start: DateTime<Utc>,
    ) -> StoreResult<Option<WaitingListEntry>> {
        let sql = format!(
            "SELECT {WAITLIST_COLUMNS} FROM waiting_list_entries \
             WHERE court_id = $1 AND slot_start_time = $2 AND status = 'waiting' \
             ORDER BY requested_at, id LIMIT 1 FOR UPDATE"
        );
        sqlx::query_as::<_, WaitlistRow>(&sql)
            .bind(court.as_uuid())
            .bind(slot_start)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to load next waitlist entry", e))?
            .map(WaitingListEntry::try_from)
            .transpose()
    }

    async fn lock_waitlist_entry(&mut self, id: WaitlistEntryId) -> StoreResult<Option<WaitingListEntry>> {
        let sql = format!("SELECT {WAITLIST_COLUMNS} FROM waiting_list_entries WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, WaitlistRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to lock waitlist entry", e))?
            .map(WaitingListEntry::try_from)
            .transpose()
    }

    async fn insert_waitlist_entry(&mut self, entry: &WaitingListEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO waiting_list_entries (id, court_id, user_id, slot_start_time, slot_end_time, \
                                               status, requested_at, confirmation_token, \
                                               notification_sent_at, notification_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.court_id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.slot_start_time)
        .bind(entry.slot_end_time)
        .bind(entry.status.as_str())
        .bind(entry.requested_at)
        .bind(entry.confirmation_token.as_deref())
        .bind(entry.notification_sent_at)
        .bind(entry.notification_expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to insert waitlist entry", e))?;
        Ok(())
    }

    async fn update_waitlist_entry(&mut self, entry: &WaitingListEntry) -> StoreResult<()> {
        sqlx::query(
            "UPDATE waiting_list_entries \
             SET status = $2, confirmation_token = $3, \
                 notification_sent_at = $4, notification_expires_at = $5 \
             WHERE id = $1",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.confirmation_token.as_deref())
        .bind(entry.notification_sent_at)
        .bind(entry.notification_expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to update waitlist entry", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| storage_error("Failed to commit transaction", e))
    }
}
