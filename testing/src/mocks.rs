//! Deterministic implementations of the environment traits.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use courtside_core::environment::{
    Clock, Email, EventPublisher, Mailer, NotifyError, TokenGenerator,
};
use courtside_core::event::DomainEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle and advance the
/// clock the service sees.
///
/// # Example
///
/// ```
/// use courtside_testing::mocks::TestClock;
/// use courtside_core::Clock;
/// use chrono::{Duration, Utc};
///
/// let clock = TestClock::new(Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::minutes(31));
/// assert_eq!(clock.now() - before, Duration::minutes(31));
/// ```
#[derive(Debug, Clone)]
pub struct TestClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    /// Create a clock frozen at `time`
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Jump to `time`
    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock().unwrap() = time;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap();
        *time += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap()
    }
}

/// Tokens `000…01`, `000…02`, … (64 hex characters each).
#[derive(Debug, Clone, Default)]
pub struct SequentialTokens {
    next: Arc<AtomicU64>,
}

impl SequentialTokens {
    /// Start from 1
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenGenerator for SequentialTokens {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:064x}")
    }
}

/// Mailer that keeps every email instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingMailer {
    /// Empty mailbox
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every email sent so far
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Emails addressed to `address`
    #[must_use]
    pub fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent()
            .into_iter()
            .filter(|e| e.to == address)
            .collect()
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Forget recorded emails
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError(format!("refusing to send to {}", email.to)));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Publisher that keeps every event.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingPublisher {
    /// No events yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Wire names of published events, in order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: DomainEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_tokens_are_distinct_and_well_formed() {
        let tokens = SequentialTokens::new();
        let first = tokens.generate();
        let second = tokens.generate();

        assert_eq!(first.len(), 64);
        assert!(first.ends_with('1'));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn failing_mailer_records_nothing() {
        let mailer = RecordingMailer::new();
        mailer.fail_sends(true);
        let result = mailer
            .send(Email {
                to: "a@example.com".into(),
                subject: "s".into(),
                body: "b".into(),
                attachments: vec![],
            })
            .await;

        assert!(result.is_err());
        assert!(mailer.sent().is_empty());
    }
}
