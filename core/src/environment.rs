//! Injected dependencies of the core.
//!
//! Everything that touches the outside world (time, randomness, email,
//! push notifications) is abstracted behind a trait and handed to
//! [`crate::Courtside`] through [`Environment`]. Production implementations
//! live here or in the web crate; deterministic ones live in
//! `courtside-testing`.

use crate::event::DomainEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of single-use waitlist confirmation tokens.
pub trait TokenGenerator: Send + Sync {
    /// Produce a fresh, unguessable token.
    fn generate(&self) -> String;
}

/// 32 random bytes from the thread RNG, hex encoded (64 characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenGenerator for RandomTokens {
    fn generate(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// File attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient
    pub filename: String,
    /// MIME type
    pub content_type: String,
    /// Raw content
    pub content: Vec<u8>,
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Optional attachments
    pub attachments: Vec<Attachment>,
}

/// Notification delivery failure.
#[derive(Error, Debug)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget email delivery.
///
/// Called only after the owning transaction has committed. Failures are
/// logged by the caller and never undo the committed change.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message could not be handed off.
    async fn send(&self, email: Email) -> Result<(), NotifyError>;
}

/// Push channel for state-change events. Advisory only.
pub trait EventPublisher: Send + Sync {
    /// Broadcast an event to connected clients.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the event could not be queued.
    fn publish(&self, event: DomainEvent) -> Result<(), NotifyError>;
}

/// Domain policy knobs that are deployment configuration rather than
/// per-instance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// How long a notified waitlist entry may confirm
    pub waitlist_confirmation_minutes: i64,
    /// Lead time under which any departure cancels an open match
    pub auto_cancel_hours_before: u32,
    /// Longest bookable duration
    pub max_duration_minutes: i64,
    /// Smallest capacity of an open match
    pub min_participants: u32,
    /// Largest capacity of an open match
    pub max_participants: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            waitlist_confirmation_minutes: 30,
            auto_cancel_hours_before: 6,
            max_duration_minutes: 180,
            min_participants: 2,
            max_participants: 4,
        }
    }
}

/// Bundle of injected dependencies.
#[derive(Clone)]
pub struct Environment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Token source
    pub tokens: Arc<dyn TokenGenerator>,
    /// Email sink
    pub mailer: Arc<dyn Mailer>,
    /// Push channel
    pub events: Arc<dyn EventPublisher>,
    /// Base URL used to build waitlist confirmation links
    pub app_url: String,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("app_url", &self.app_url)
            .finish_non_exhaustive()
    }
}
