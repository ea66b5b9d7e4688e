//! Booking creation, cancellation and the schedule views built on them.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::Duration;
use courtside_core::booking::CreateBooking;
use courtside_core::schedule::SlotStatus;
use courtside_core::types::{BookingId, BookingStatus, CourtId, ParticipationType};
use courtside_core::{BookingError, DomainEvent};
use courtside_testing::TestHarness;
use courtside_testing::harness::base_date;

fn request(h: &TestHarness, start: chrono::DateTime<chrono::Utc>, minutes: u32) -> CreateBooking {
    CreateBooking {
        court_id: h.court.id,
        start_time: start,
        duration_minutes: minutes,
        is_open_match: false,
        max_participants: None,
    }
}

#[tokio::test]
async fn private_booking_is_confirmed_announced_and_mailed() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;

    let booking = h.book(alice, h.at(1, 10, 0), 90).await;

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.end_time - booking.start_time, Duration::minutes(90));
    assert!(!booking.is_open_match);
    assert_eq!(booking.max_participants, None);
    assert_eq!(booking.auto_cancel_hours_before, None);

    assert_eq!(h.events.names(), ["booking:created"]);
    let mail = h.mailer.sent_to("alice@example.com");
    assert_eq!(mail.len(), 1);
    assert!(mail[0].subject.contains("Pista Central"));
    assert!(mail[0].body.starts_with("Hi Alice"));
}

#[tokio::test]
async fn start_must_be_strictly_in_the_future() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;

    let err = h
        .service
        .create_booking(alice, request(&h, h.at(0, 7, 0), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    let err = h
        .service
        .create_booking(alice, request(&h, h.at(-1, 10, 0), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert!(h.store.bookings().await.is_empty());
}

#[tokio::test]
async fn durations_hours_and_horizon_are_validated() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;

    for minutes in [0, 45, 210] {
        let err = h
            .service
            .create_booking(alice, request(&h, h.at(1, 10, 0), minutes))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)), "{minutes} minutes accepted");
    }

    // Runs past closing.
    let err = h
        .service
        .create_booking(alice, request(&h, h.at(1, 21, 30), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    // Off the half-hour grid.
    let err = h
        .service
        .create_booking(alice, request(&h, h.at(1, 10, 15), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    // Beyond the 7 day horizon.
    let err = h
        .service
        .create_booking(alice, request(&h, h.at(8, 10, 0), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(msg) if msg.contains("7 days")));
}

#[tokio::test]
async fn advance_window_follows_instance_settings() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    h.store.set_setting("booking_advance_days", "14").await;

    let booking = h.book(alice, h.at(8, 10, 0), 60).await;
    assert_eq!(booking.start_time, h.at(8, 10, 0));
}

#[tokio::test]
async fn open_match_needs_a_sane_capacity() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;

    for max in [None, Some(1), Some(5)] {
        let err = h
            .service
            .create_booking(
                alice,
                CreateBooking {
                    is_open_match: true,
                    max_participants: max,
                    ..request(&h, h.at(1, 10, 0), 60)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)), "{max:?} accepted");
    }
}

#[tokio::test]
async fn one_active_private_booking_per_owner_but_open_matches_are_exempt() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    h.book(alice, h.at(1, 10, 0), 60).await;

    let err = h
        .service
        .create_booking(alice, request(&h, h.at(2, 10, 0), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));

    let open = h.open_match(alice, h.at(2, 10, 0), 60, 4).await;
    assert!(open.is_open_match);
    assert_eq!(open.auto_cancel_hours_before, Some(6));
    assert_eq!(h.store.roster(open.id).await.len(), 1);
}

#[tokio::test]
async fn overlapping_bookings_and_blocks_conflict() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let carol = h.user("Carol").await;
    h.book(alice, h.at(1, 10, 0), 60).await;

    let err = h
        .service
        .create_booking(bob, request(&h, h.at(1, 10, 30), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));

    // Back-to-back is fine.
    h.book(bob, h.at(1, 11, 0), 60).await;

    h.store
        .add_block(h.court.id, h.at(1, 15, 0), h.at(1, 17, 0), Some("Tournament"))
        .await;
    let err = h
        .service
        .create_booking(carol, request(&h, h.at(1, 14, 30), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));
}

#[tokio::test]
async fn unknown_and_inactive_courts_are_rejected() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;

    let err = h
        .service
        .create_booking(
            alice,
            CreateBooking {
                court_id: CourtId::new(),
                ..request(&h, h.at(1, 10, 0), 60)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));

    h.store.set_court_active(h.court.id, false).await;
    let err = h
        .service
        .create_booking(alice, request(&h, h.at(1, 10, 0), 60))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert!(h.service.courts().await.unwrap().is_empty());
}

#[tokio::test]
async fn courts_are_listed_by_name() {
    let h = TestHarness::new().await;
    h.store.add_court("Pista 2").await;
    h.store.add_court("Pista 1").await;

    let names: Vec<String> = h
        .service
        .courts()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Pista 1", "Pista 2", "Pista Central"]);
}

#[tokio::test]
async fn owner_cancels_and_others_cannot() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let booking = h.book(alice, h.at(1, 10, 0), 60).await;

    let err = h.service.cancel_booking(bob, booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Forbidden(_)));

    let err = h
        .service
        .cancel_booking(alice, BookingId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));

    let cancelled = h.service.cancel_booking(alice, booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::CancelledByUser);
    assert_eq!(
        h.store.get_booking(booking.id).await.unwrap().status,
        BookingStatus::CancelledByUser
    );
    assert!(matches!(
        h.events.events().last(),
        Some(DomainEvent::BookingCancelled { booking_id, .. }) if *booking_id == booking.id
    ));

    let err = h.service.cancel_booking(alice, booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));

    // The slot and the owner's quota are free again.
    h.book(alice, h.at(1, 10, 0), 60).await;
}

#[tokio::test]
async fn my_bookings_annotates_participation() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let private = h.book(alice, h.at(1, 10, 0), 60).await;
    let open = h.open_match(bob, h.at(2, 18, 0), 90, 4).await;
    h.service.join_match(alice, open.id).await.unwrap();

    let mine = h.service.my_bookings(alice).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].booking.id, private.id);
    assert_eq!(mine[0].participation_type, ParticipationType::Owner);
    assert_eq!(mine[1].booking.id, open.id);
    assert_eq!(mine[1].participation_type, ParticipationType::Participant);
    assert_eq!(mine[1].court_name, "Pista Central");

    // Ended bookings drop off.
    h.clock.set(h.at(1, 11, 0));
    let mine = h.service.my_bookings(alice).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn notifier_failure_does_not_undo_a_booking() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    h.mailer.fail_sends(true);

    let booking = h.book(alice, h.at(1, 10, 0), 60).await;

    assert!(h.mailer.sent().is_empty());
    assert_eq!(
        h.store.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn day_schedule_reflects_a_one_hour_booking() {
    let h = TestHarness::new().await;
    let alice = h.user("Alice").await;
    h.book(alice, h.at(1, 10, 0), 60).await;
    let tuesday = base_date() + Duration::days(1);

    let slots = h
        .service
        .day_schedule(h.court.id, tuesday, None)
        .await
        .unwrap();
    let status_at = |hour, minute| {
        slots
            .iter()
            .find(|s| s.start_time == h.at(1, hour, minute))
            .map(|s| s.status.clone())
            .unwrap()
    };

    assert_eq!(slots.len(), 28);
    assert!(matches!(status_at(10, 0), SlotStatus::Booked { .. }));
    assert!(matches!(status_at(10, 30), SlotStatus::Booked { .. }));
    assert_eq!(
        status_at(9, 30),
        SlotStatus::Available {
            available_durations: vec![]
        }
    );
    assert_eq!(
        status_at(9, 0),
        SlotStatus::Available {
            available_durations: vec![60]
        }
    );
    assert_eq!(
        status_at(11, 0),
        SlotStatus::Available {
            available_durations: vec![60, 90]
        }
    );

    let as_owner = h
        .service
        .day_schedule(h.court.id, tuesday, Some(alice))
        .await
        .unwrap();
    assert!(as_owner
        .iter()
        .any(|s| matches!(s.status, SlotStatus::MyPrivateBooking { .. })));

    // No mutation in between: same answer.
    let again = h
        .service
        .day_schedule(h.court.id, tuesday, None)
        .await
        .unwrap();
    assert_eq!(slots, again);
}

#[tokio::test]
async fn week_schedule_marks_started_slots_past() {
    let h = TestHarness::new().await;
    h.clock.set(h.at(0, 12, 10));

    let week = h
        .service
        .week_schedule(h.court.id, base_date() + Duration::days(3), None)
        .await
        .unwrap();

    assert_eq!(week.week_start, base_date());
    let monday = &week.schedule[&base_date()];
    let past = monday
        .iter()
        .filter(|s| s.status == SlotStatus::Past)
        .count();
    // 08:00 through 12:00 inclusive.
    assert_eq!(past, 9);

    let err = h
        .service
        .week_schedule(CourtId::new(), base_date(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_slot_admit_exactly_one() {
    let h = TestHarness::new().await;
    let mut users = Vec::new();
    for i in 0..8 {
        users.push(h.user(&format!("Player{i}")).await);
    }

    let start = h.at(2, 19, 0);
    let tasks: Vec<_> = users
        .into_iter()
        .map(|user| {
            let service = h.service.clone();
            let req = request(&h, start, 90);
            tokio::spawn(async move { service.create_booking(user, req).await })
        })
        .collect();

    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(BookingError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(admitted, 1);
}
