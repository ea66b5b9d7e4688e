//! Ready-made service wired to the in-memory store and recording mocks.

use crate::memory_store::InMemoryStore;
use crate::mocks::{RecordingMailer, RecordingPublisher, SequentialTokens, TestClock};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use courtside_core::booking::CreateBooking;
use courtside_core::environment::{BookingPolicy, Environment};
use courtside_core::schedule::local_to_utc;
use courtside_core::types::{Booking, Court, UserId};
use courtside_core::Courtside;
use std::sync::Arc;

/// Operator time zone used by the fixture.
pub const TEST_TZ: Tz = chrono_tz::Europe::Madrid;

/// Base URL used in confirmation links.
pub const TEST_APP_URL: &str = "http://courtside.test";

/// A service plus handles on everything it talks to.
///
/// The clock starts on Monday 2030-06-10 at 07:00 local time, one hour
/// before opening, with a single active court.
#[derive(Debug, Clone)]
pub struct TestHarness {
    /// Service under test
    pub service: Courtside,
    /// Backing store, for seeding and assertions
    pub store: InMemoryStore,
    /// Shared clock
    pub clock: TestClock,
    /// Captured emails
    pub mailer: RecordingMailer,
    /// Captured push events
    pub events: RecordingPublisher,
    /// The court created on setup
    pub court: Court,
}

impl TestHarness {
    /// Fixture with the default policy
    pub async fn new() -> Self {
        Self::with_policy(BookingPolicy::default()).await
    }

    /// Fixture with a custom policy
    pub async fn with_policy(policy: BookingPolicy) -> Self {
        let store = InMemoryStore::new();
        let court = store.add_court("Pista Central").await;
        let clock = TestClock::new(local(base_date(), 7, 0));
        let mailer = RecordingMailer::new();
        let events = RecordingPublisher::new();

        let env = Environment {
            clock: Arc::new(clock.clone()),
            tokens: Arc::new(SequentialTokens::new()),
            mailer: Arc::new(mailer.clone()),
            events: Arc::new(events.clone()),
            app_url: TEST_APP_URL.to_string(),
        };
        let service = Courtside::new(Arc::new(store.clone()), env, policy, TEST_TZ);

        Self {
            service,
            store,
            clock,
            mailer,
            events,
            court,
        }
    }

    /// Register a user named `name` with address `<name>@example.com`
    pub async fn user(&self, name: &str) -> UserId {
        self.store
            .add_user(name, &format!("{}@example.com", name.to_lowercase()))
            .await
    }

    /// Local wall-clock time `days` after the base date, in UTC
    #[must_use]
    pub fn at(&self, days: i64, hour: u32, minute: u32) -> DateTime<Utc> {
        local(base_date() + Duration::days(days), hour, minute)
    }

    /// Private booking on the fixture court
    ///
    /// # Panics
    ///
    /// Panics if the booking is rejected.
    pub async fn book(&self, user: UserId, start: DateTime<Utc>, minutes: u32) -> Booking {
        self.service
            .create_booking(
                user,
                CreateBooking {
                    court_id: self.court.id,
                    start_time: start,
                    duration_minutes: minutes,
                    is_open_match: false,
                    max_participants: None,
                },
            )
            .await
            .unwrap()
    }

    /// Open match on the fixture court
    ///
    /// # Panics
    ///
    /// Panics if the booking is rejected.
    pub async fn open_match(
        &self,
        organizer: UserId,
        start: DateTime<Utc>,
        minutes: u32,
        max: u32,
    ) -> Booking {
        self.service
            .create_booking(
                organizer,
                CreateBooking {
                    court_id: self.court.id,
                    start_time: start,
                    duration_minutes: minutes,
                    is_open_match: true,
                    max_participants: Some(max),
                },
            )
            .await
            .unwrap()
    }
}

/// Monday 2030-06-10.
#[must_use]
pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 10).unwrap()
}

fn local(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    local_to_utc(TEST_TZ, date, NaiveTime::from_hms_opt(hour, minute, 0).unwrap()).unwrap()
}
