//! Console mailer for development.

use async_trait::async_trait;
use courtside_core::environment::{Email, Mailer, NotifyError};
use tracing::info;

/// Mailer that logs emails instead of sending them.
///
/// Used until an SMTP transport is configured; confirmation links show up
/// in the server log.
#[derive(Clone, Debug, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Create a new console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email (development mode)"
        );
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║ To: {:<57}║", email.to);
        println!("║ Subject: {:<52}║", email.subject);
        println!("╠══════════════════════════════════════════════════════════════╣");
        for line in email.body.lines() {
            println!("║ {line:<61}║");
        }
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_mailer_always_succeeds() {
        let email = Email {
            to: "alice@example.com".into(),
            subject: "Booking confirmed".into(),
            body: "Hi Alice,\n\nSee you on court.".into(),
            attachments: Vec::new(),
        };
        assert!(ConsoleMailer::new().send(email).await.is_ok());
    }
}
