//! Axum HTTP surface for the Courtside booking service.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** the caller (`X-User-Id`), path, query and JSON body
//! 3. **Call** the matching [`Courtside`](courtside_core::Courtside) operation
//! 4. **Commit**, then emails and push events go out
//! 5. **Map** the result or [`BookingError`](courtside_core::BookingError) to a response
//!
//! Push events reach websocket clients through [`BroadcastPublisher`];
//! background sweeps are started by [`jobs::spawn_sweeps`].
//!
//! # Example
//!
//! ```ignore
//! use courtside_web::{AppState, BroadcastPublisher, build_router};
//!
//! let events = BroadcastPublisher::default();
//! let app = build_router(AppState::new(service, events));
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod extractors;
pub mod handlers;
pub mod jobs;
pub mod mailer;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use events::BroadcastPublisher;
pub use extractors::{CurrentUser, USER_ID_HEADER};
pub use mailer::ConsoleMailer;
pub use routes::build_router;
pub use state::AppState;
