//! HTTP-level tests of the Courtside API against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use chrono::{DateTime, Utc};
use courtside_core::types::UserId;
use courtside_testing::{TEST_APP_URL, TestHarness};
use courtside_web::{AppState, BroadcastPublisher, build_router};
use serde_json::{Value, json};

struct Api {
    h: TestHarness,
    server: TestServer,
}

impl Api {
    async fn new() -> Self {
        let h = TestHarness::new().await;
        let state = AppState::new(h.service.clone(), BroadcastPublisher::default());
        let server = TestServer::new(build_router(state)).expect("Failed to start test server");
        Self { h, server }
    }

    async fn book(&self, user: UserId, start: DateTime<Utc>, minutes: u32) -> TestResponse {
        self.server
            .post("/api/bookings")
            .add_header(user_header(), as_header(user))
            .json(&json!({
                "courtId": self.h.court.id,
                "startTime": start,
                "durationMinutes": minutes,
                "isOpenMatch": false,
            }))
            .await
    }

    async fn open_match(&self, user: UserId, start: DateTime<Utc>, max: u32) -> Value {
        let response = self
            .server
            .post("/api/bookings")
            .add_header(user_header(), as_header(user))
            .json(&json!({
                "courtId": self.h.court.id,
                "startTime": start,
                "durationMinutes": 90,
                "isOpenMatch": true,
                "maxParticipants": max,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }
}

fn user_header() -> HeaderName {
    HeaderName::from_static("x-user-id")
}

fn as_header(user: UserId) -> HeaderValue {
    HeaderValue::from_str(&user.to_string()).unwrap()
}

fn code_of(response: &TestResponse) -> String {
    response.json::<Value>()["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_endpoints_respond() {
    let api = Api::new().await;

    let live = api.server.get("/health").await;
    live.assert_status_ok();
    live.assert_text("ok");

    let ready = api.server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["database"], json!(true));
}

#[tokio::test]
async fn courts_are_listed() {
    let api = Api::new().await;
    let response = api.server.get("/api/courts").await;
    response.assert_status_ok();
    let courts: Value = response.json();
    assert_eq!(courts[0]["name"], "Pista Central");
}

#[tokio::test]
async fn caller_identity_is_required() {
    let api = Api::new().await;

    let missing = api
        .server
        .post("/api/bookings")
        .json(&json!({
            "courtId": api.h.court.id,
            "startTime": api.h.at(1, 10, 0),
            "durationMinutes": 60,
        }))
        .await;
    missing.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(code_of(&missing), "UNAUTHORIZED");

    let garbage = api
        .server
        .get("/api/bookings/me")
        .add_header(user_header(), HeaderValue::from_static("alice"))
        .await;
    garbage.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let api = Api::new().await;
    let alice = api.h.user("Alice").await;
    let bob = api.h.user("Bob").await;

    let created = api.book(alice, api.h.at(1, 10, 0), 90).await;
    created.assert_status(StatusCode::CREATED);
    let booking: Value = created.json();
    assert_eq!(booking["status"], "confirmed");
    let id = booking["id"].as_str().unwrap().to_string();

    let taken = api.book(bob, api.h.at(1, 11, 0), 60).await;
    taken.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(code_of(&taken), "CONFLICT");

    let mine = api
        .server
        .get("/api/bookings/me")
        .add_header(user_header(), as_header(alice))
        .await;
    mine.assert_status_ok();
    let mine: Value = mine.json();
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["participation_type"], "owner");
    assert_eq!(mine[0]["court_name"], "Pista Central");

    let stranger = api
        .server
        .delete(&format!("/api/bookings/{id}"))
        .add_header(user_header(), as_header(bob))
        .await;
    stranger.assert_status(StatusCode::FORBIDDEN);

    let cancelled = api
        .server
        .delete(&format!("/api/bookings/{id}"))
        .add_header(user_header(), as_header(alice))
        .await;
    cancelled.assert_status_ok();
    assert_eq!(cancelled.json::<Value>()["status"], "cancelled_by_user");

    let again = api
        .server
        .delete(&format!("/api/bookings/{id}"))
        .add_header(user_header(), as_header(alice))
        .await;
    again.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_is_a_validation_error() {
    let api = Api::new().await;
    let alice = api.h.user("Alice").await;

    let bad_json = api
        .server
        .post("/api/bookings")
        .add_header(user_header(), as_header(alice))
        .json(&json!({ "courtId": "not-a-uuid" }))
        .await;
    bad_json.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(code_of(&bad_json), "VALIDATION_ERROR");

    let past = api.book(alice, api.h.at(-1, 10, 0), 60).await;
    past.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(code_of(&past), "VALIDATION_ERROR");

    let bad_path = api
        .server
        .delete("/api/bookings/42")
        .add_header(user_header(), as_header(alice))
        .await;
    bad_path.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schedules_are_rendered_per_viewer() {
    let api = Api::new().await;
    let alice = api.h.user("Alice").await;
    api.book(alice, api.h.at(1, 10, 0), 60).await.assert_status(StatusCode::CREATED);

    let court = api.h.court.id;
    let day = api
        .server
        .get(&format!("/api/schedule/day?courtId={court}&date=2030-06-11"))
        .add_header(user_header(), as_header(alice))
        .await;
    day.assert_status_ok();
    let slots: Value = day.json();
    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 28);
    assert_eq!(slots[0]["status"], "available");
    assert_eq!(slots[0]["availableDurations"], json!([60, 90]));
    assert_eq!(slots[4]["status"], "my_private_booking");

    let anonymous = api
        .server
        .get(&format!("/api/schedule/day?courtId={court}&date=2030-06-11"))
        .await;
    assert_eq!(anonymous.json::<Value>()[4]["status"], "booked");

    let week = api
        .server
        .get(&format!("/api/schedule/week?courtId={court}&date=2030-06-12"))
        .await;
    week.assert_status_ok();
    let week: Value = week.json();
    assert_eq!(week["weekStart"], "2030-06-10");
    assert_eq!(week["weekEnd"], "2030-06-16");
    assert_eq!(week["schedule"].as_object().unwrap().len(), 7);

    let unknown = api
        .server
        .get(&format!("/api/schedule/day?courtId={}&date=2030-06-11", uuid::Uuid::new_v4()))
        .await;
    unknown.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn open_match_flow_over_http() {
    let api = Api::new().await;
    let organizer = api.h.user("Org").await;
    let bob = api.h.user("Bob").await;

    let game = api.open_match(organizer, api.h.at(2, 19, 0), 4).await;
    let id = game["id"].as_str().unwrap().to_string();

    let joined = api
        .server
        .post(&format!("/api/matches/{id}/join"))
        .add_header(user_header(), as_header(bob))
        .await;
    joined.assert_status_ok();
    assert_eq!(joined.json::<Value>()["currentParticipants"], 2);

    let twice = api
        .server
        .post(&format!("/api/matches/{id}/join"))
        .add_header(user_header(), as_header(bob))
        .await;
    twice.assert_status(StatusCode::BAD_REQUEST);

    let open = api.server.get("/api/matches/open").await;
    open.assert_status_ok();
    assert_eq!(open.json::<Value>()[0]["current_participants"], 2);

    let roster = api.server.get(&format!("/api/matches/{id}/participants")).await;
    roster.assert_status_ok();
    let roster: Value = roster.json();
    assert_eq!(roster[0]["isOrganizer"], true);
    assert_eq!(roster[1]["userId"], json!(bob));

    let left = api
        .server
        .delete(&format!("/api/matches/{id}/leave"))
        .add_header(user_header(), as_header(organizer))
        .await;
    left.assert_status_ok();
    let left: Value = left.json();
    assert_eq!(left["outcome"], "ownership_transferred");
    assert_eq!(left["newOrganizer"], json!(bob));
}

#[tokio::test]
async fn waitlist_flow_over_http() {
    let api = Api::new().await;
    let alice = api.h.user("Alice").await;
    let bob = api.h.user("Bob").await;

    let booking: Value = api.book(alice, api.h.at(1, 10, 0), 60).await.json();
    let joined = api
        .server
        .post("/api/waiting-list")
        .add_header(user_header(), as_header(bob))
        .json(&json!({
            "courtId": api.h.court.id,
            "slotStartTime": booking["start_time"],
            "slotEndTime": booking["end_time"],
        }))
        .await;
    joined.assert_status(StatusCode::CREATED);
    let entry: Value = joined.json();
    assert_eq!(entry["status"], "waiting");
    assert!(entry.get("confirmation_token").is_none());

    let bogus = api
        .server
        .post("/api/waiting-list/confirm")
        .json(&json!({ "token": "deadbeef" }))
        .await;
    bogus.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(code_of(&bogus), "EXPIRED_OR_INVALID");

    let id = booking["id"].as_str().unwrap();
    api.server
        .delete(&format!("/api/bookings/{id}"))
        .add_header(user_header(), as_header(alice))
        .await
        .assert_status_ok();

    let offer = api.h.mailer.sent_to("bob@example.com");
    assert_eq!(offer.len(), 1);
    let link = offer[0]
        .body
        .lines()
        .find_map(|line| line.trim().strip_prefix(TEST_APP_URL))
        .expect("offer email carries a confirmation link")
        .to_string();
    assert!(link.starts_with("/api/waiting-list/confirm?token="));

    let confirmed = api.server.get(&link).await;
    confirmed.assert_status_ok();
    let rebooked: Value = confirmed.json();
    assert_eq!(rebooked["user_id"], json!(bob));
    assert_eq!(rebooked["start_time"], booking["start_time"]);

    let reused = api.server.get(&link).await;
    reused.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(code_of(&reused), "EXPIRED_OR_INVALID");
}
