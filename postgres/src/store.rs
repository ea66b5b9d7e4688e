//! Pool-backed read side.

use crate::rows::{
    BOOKING_COLUMNS, BlockRow, BookingRow, ContactRow, CourtRow, ListedBookingRow, ParticipantRow,
    WAITLIST_COLUMNS, WaitlistRow, count,
};
use crate::storage_error;
use crate::transaction::PgTransaction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courtside_core::StorageError;
use courtside_core::schedule::ScheduledBooking;
use courtside_core::store::{Store, StoreResult, Transaction};
use courtside_core::types::{
    BlockedPeriod, Booking, BookingId, Court, CourtId, InstanceSettings, MatchParticipant, OpenMatchSummary,
    ParticipationType, UserBooking, UserContact, UserId, WaitingListEntry,
};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Player count of `b`: participant rows plus the organizer when they have none.
const PLAYER_COUNT: &str = "(SELECT COUNT(*) FROM match_participants p WHERE p.booking_id = b.id) \
     + CASE WHEN EXISTS (SELECT 1 FROM match_participants p \
                         WHERE p.booking_id = b.id AND p.user_id = b.user_id) \
            THEN 0 ELSE 1 END";

/// `PostgreSQL` implementation of [`Store`].
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StorageError::Database(format!("Failed to connect to database: {e}")))?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn settings(&self) -> StoreResult<InstanceSettings> {
        let pairs: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM instance_settings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load settings", e))?;
        let pairs: HashMap<String, String> = pairs.into_iter().collect();
        Ok(InstanceSettings::from_pairs(&pairs))
    }

    async fn active_courts(&self) -> StoreResult<Vec<Court>> {
        let rows = sqlx::query_as::<_, CourtRow>(
            "SELECT id, name, is_active FROM courts WHERE is_active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load courts", e))?;
        Ok(rows.into_iter().map(Court::from).collect())
    }

    async fn court(&self, id: CourtId) -> StoreResult<Option<Court>> {
        let row = sqlx::query_as::<_, CourtRow>("SELECT id, name, is_active FROM courts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load court", e))?;
        Ok(row.map(Court::from))
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1");
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load booking", e))?
            .map(Booking::try_from)
            .transpose()
    }

    async fn participants(&self, booking: BookingId) -> StoreResult<Vec<MatchParticipant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT booking_id, user_id, joined_at FROM match_participants \
             WHERE booking_id = $1 ORDER BY joined_at, user_id",
        )
        .bind(booking.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load participants", e))?;
        Ok(rows.into_iter().map(MatchParticipant::from).collect())
    }

    async fn schedule_window(
        &self,
        court: CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<(Vec<ScheduledBooking>, Vec<BlockedPeriod>)> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b \
             WHERE b.court_id = $1 AND b.status = 'confirmed' \
               AND b.start_time < $3 AND b.end_time > $2 \
             ORDER BY b.start_time"
        );
        let bookings = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(court.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load bookings", e))?
            .into_iter()
            .map(Booking::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = bookings
            .iter()
            .filter(|b| b.is_open_match)
            .map(|b| *b.id.as_uuid())
            .collect();
        let mut rosters: HashMap<BookingId, Vec<MatchParticipant>> = HashMap::new();
        if !ids.is_empty() {
            let rows = sqlx::query_as::<_, ParticipantRow>(
                "SELECT booking_id, user_id, joined_at FROM match_participants \
                 WHERE booking_id = ANY($1) ORDER BY joined_at, user_id",
            )
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load rosters", e))?;
            for participant in rows.into_iter().map(MatchParticipant::from) {
                rosters.entry(participant.booking_id).or_default().push(participant);
            }
        }

        let blocks = sqlx::query_as::<_, BlockRow>(
            "SELECT id, court_id, start_time, end_time, reason, is_full_day FROM blocked_periods \
             WHERE court_id = $1 AND start_time < $3 AND end_time > $2 ORDER BY start_time",
        )
        .bind(court.as_uuid())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load blocked periods", e))?;

        let scheduled = bookings
            .into_iter()
            .map(|booking| ScheduledBooking {
                participants: rosters.remove(&booking.id).unwrap_or_default(),
                booking,
            })
            .collect();
        Ok((scheduled, blocks.into_iter().map(Into::into).collect()))
    }

    async fn user_bookings(&self, user: UserId, now: DateTime<Utc>) -> StoreResult<Vec<UserBooking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS}, c.name AS court_name, (b.user_id = $1) AS is_owner, \
                    ({PLAYER_COUNT}) AS current_participants \
             FROM bookings b JOIN courts c ON c.id = b.court_id \
             WHERE b.status = 'confirmed' AND b.end_time > $2 \
               AND (b.user_id = $1 OR EXISTS (SELECT 1 FROM match_participants p \
                                              WHERE p.booking_id = b.id AND p.user_id = $1)) \
             ORDER BY b.start_time"
        );
        sqlx::query_as::<_, ListedBookingRow>(&sql)
            .bind(user.as_uuid())
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load user bookings", e))?
            .into_iter()
            .map(|row| {
                Ok(UserBooking {
                    participation_type: if row.is_owner {
                        ParticipationType::Owner
                    } else {
                        ParticipationType::Participant
                    },
                    court_name: row.court_name,
                    booking: row.booking.try_into()?,
                })
            })
            .collect()
    }

    async fn open_matches(&self, now: DateTime<Utc>) -> StoreResult<Vec<OpenMatchSummary>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS}, c.name AS court_name, FALSE AS is_owner, \
                    ({PLAYER_COUNT}) AS current_participants \
             FROM bookings b JOIN courts c ON c.id = b.court_id \
             WHERE b.is_open_match AND b.status = 'confirmed' AND b.end_time > $1 \
             ORDER BY b.start_time"
        );
        sqlx::query_as::<_, ListedBookingRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load open matches", e))?
            .into_iter()
            .map(|row| {
                Ok(OpenMatchSummary {
                    current_participants: count(row.current_participants),
                    court_name: row.court_name,
                    booking: row.booking.try_into()?,
                })
            })
            .collect()
    }

    async fn open_matches_due(
        &self,
        now: DateTime<Utc>,
        default_lead_hours: u32,
    ) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b \
             WHERE b.is_open_match AND b.status = 'confirmed' AND b.start_time > $1 \
               AND b.start_time <= $1 + make_interval(hours => COALESCE(b.auto_cancel_hours_before, $2)) \
             ORDER BY b.start_time"
        );
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(now)
            .bind(i32::try_from(default_lead_hours).unwrap_or(i32::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load upcoming open matches", e))?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }

    async fn user_contact(&self, user: UserId) -> StoreResult<Option<UserContact>> {
        let row = sqlx::query_as::<_, ContactRow>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(user.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load user contact", e))?;
        Ok(row.map(UserContact::from))
    }

    async fn waitlist_entry_by_token(&self, token: &str) -> StoreResult<Option<WaitingListEntry>> {
        let sql = format!("SELECT {WAITLIST_COLUMNS} FROM waiting_list_entries WHERE confirmation_token = $1");
        sqlx::query_as::<_, WaitlistRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to look up confirmation token", e))?
            .map(WaitingListEntry::try_from)
            .transpose()
    }

    async fn expired_notifications(&self, now: DateTime<Utc>) -> StoreResult<Vec<WaitingListEntry>> {
        let sql = format!(
            "SELECT {WAITLIST_COLUMNS} FROM waiting_list_entries \
             WHERE status = 'notified' AND notification_expires_at <= $1 \
             ORDER BY notification_expires_at"
        );
        sqlx::query_as::<_, WaitlistRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load expired notifications", e))?
            .into_iter()
            .map(WaitingListEntry::try_from)
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Health check failed", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgTransaction::new(tx)))
    }
}
