//! # Courtside Testing
//!
//! Testing utilities for the Courtside booking service.
//!
//! This crate provides:
//! - Deterministic implementations of the environment traits ([`mocks`])
//! - A transactional in-memory [`Store`](courtside_core::store::Store)
//! - A [`TestHarness`] wiring both into a ready service
//! - proptest strategies for the Slot Model ([`properties`])
//!
//! ## Example
//!
//! ```ignore
//! use courtside_testing::TestHarness;
//!
//! #[tokio::test]
//! async fn cancelling_frees_the_slot() {
//!     let h = TestHarness::new().await;
//!     let alice = h.user("Alice").await;
//!     let booking = h.book(alice, h.at(0, 10, 0), 60).await;
//!
//!     h.service.cancel_booking(alice, booking.id).await.unwrap();
//!     assert_eq!(h.events.names(), ["booking:created", "booking:cancelled"]);
//! }
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

pub mod harness;
pub mod memory_store;
pub mod mocks;
pub mod properties;

pub use harness::{TEST_APP_URL, TEST_TZ, TestHarness};
pub use memory_store::InMemoryStore;
pub use mocks::{RecordingMailer, RecordingPublisher, SequentialTokens, TestClock};

/// Install a compact `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("courtside=debug")),
        )
        .with_test_writer()
        .try_init();
}
