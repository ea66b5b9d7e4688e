//! # Courtside Core
//!
//! Scheduling, open-match and waitlist logic for the Courtside padel court
//! booking service.
//!
//! ## Components
//!
//! - **Slot Model** ([`schedule`]): pure rendering of bookings and blocks
//!   into 30-minute slots for a day or a Monday-to-Sunday week.
//! - **Booking Lifecycle Manager** ([`Courtside::create_booking`],
//!   [`Courtside::cancel_booking`]): reservations, the single-active-booking
//!   rule, conflict checks under the court lease.
//! - **Open Match Engine** ([`Courtside::join_match`],
//!   [`Courtside::leave_match`], [`Courtside::sweep_incomplete_matches`]):
//!   capacity, organizer succession and the auto-cancel lead time.
//! - **Waitlist Pipeline** ([`Courtside::join_waitlist`],
//!   [`Courtside::confirm_from_token`],
//!   [`Courtside::sweep_expired_notifications`]): FIFO offers with a
//!   confirmation deadline, cascading on expiry.
//!
//! Every mutation runs inside one [`store::Transaction`]. Emails and push
//! events are collected while it runs and dispatched only after commit;
//! their failure never undoes a committed change.
//!
//! ## Example
//!
//! ```ignore
//! use courtside_core::{Courtside, booking::CreateBooking};
//!
//! let service = Courtside::new(store, env, BookingPolicy::default(), chrono_tz::Europe::Madrid);
//! let booking = service
//!     .create_booking(user, CreateBooking {
//!         court_id,
//!         start_time,
//!         duration_minutes: 90,
//!         is_open_match: true,
//!         max_participants: Some(4),
//!     })
//!     .await?;
//! ```

pub mod booking;
pub mod environment;
pub mod error;
pub mod event;
pub mod matches;
mod outbox;
pub mod schedule;
mod service;
pub mod store;
pub mod types;
pub mod waitlist;

pub use environment::{BookingPolicy, Clock, Environment};
pub use error::{BookingError, StorageError};
pub use event::DomainEvent;
pub use service::Courtside;
