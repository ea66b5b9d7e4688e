//! Side effects collected during a transaction and dispatched after commit.
//!
//! Nothing here can fail the operation that produced it: a lost email or
//! push event is logged and counted, the committed state stands.

use crate::environment::{Email, Environment};
use crate::event::DomainEvent;
use crate::store::Store;
use crate::types::{Booking, UserId, WaitingListEntry};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Email addressed by user ID, resolved to an address at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Notice {
    pub recipient: UserId,
    pub subject: String,
    pub body: String,
}

/// Pending events and notices of one operation.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    events: Vec<DomainEvent>,
    notices: Vec<Notice>,
}

impl Outbox {
    pub(crate) fn event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub(crate) fn notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Publish events, then send emails. Call only after commit.
    pub(crate) async fn dispatch(self, store: &dyn Store, env: &Environment) {
        for event in self.events {
            let name = event.name();
            if let Err(error) = env.events.publish(event) {
                metrics::counter!("courtside.notifications.failed").increment(1);
                tracing::warn!(event = name, %error, "Failed to publish event");
            }
        }

        for notice in self.notices {
            let contact = match store.user_contact(notice.recipient).await {
                Ok(Some(contact)) => contact,
                Ok(None) => {
                    tracing::warn!(user_id = %notice.recipient, "No contact on file, notification dropped");
                    continue;
                }
                Err(error) => {
                    metrics::counter!("courtside.notifications.failed").increment(1);
                    tracing::warn!(user_id = %notice.recipient, %error, "Contact lookup failed");
                    continue;
                }
            };

            let email = Email {
                to: contact.email,
                subject: notice.subject,
                body: format!("Hi {},\n\n{}", contact.name, notice.body),
                attachments: Vec::new(),
            };
            if let Err(error) = env.mailer.send(email).await {
                metrics::counter!("courtside.notifications.failed").increment(1);
                tracing::warn!(user_id = %notice.recipient, %error, "Failed to send email");
            }
        }
    }
}

fn local(tz: Tz, at: DateTime<Utc>) -> String {
    at.with_timezone(&tz).format("%A %d %B %Y, %H:%M").to_string()
}

pub(crate) fn booking_confirmed(tz: Tz, booking: &Booking, court_name: &str) -> Notice {
    let kind = if booking.is_open_match {
        "open match"
    } else {
        "booking"
    };
    Notice {
        recipient: booking.user_id,
        subject: format!("Your {kind} on {court_name} is confirmed"),
        body: format!(
            "Your {kind} on {court_name} from {} to {} is confirmed.\n",
            local(tz, booking.start_time),
            booking.end_time.with_timezone(&tz).format("%H:%M"),
        ),
    }
}

pub(crate) fn match_cancelled(tz: Tz, booking: &Booking, recipient: UserId, reason: &str) -> Notice {
    Notice {
        recipient,
        subject: "Your open match was cancelled".to_string(),
        body: format!(
            "The open match starting {} has been cancelled: {reason}.\n",
            local(tz, booking.start_time),
        ),
    }
}

pub(crate) fn waitlist_offer(tz: Tz, entry: &WaitingListEntry, token: &str, app_url: &str) -> Notice {
    let deadline = entry
        .notification_expires_at
        .map_or_else(String::new, |at| at.with_timezone(&tz).format("%H:%M").to_string());
    Notice {
        recipient: entry.user_id,
        subject: "A slot you were waiting for is free".to_string(),
        body: format!(
            "The slot starting {} is now available.\n\
             Confirm before {deadline} to book it:\n\n{}/api/waiting-list/confirm?token={token}\n",
            local(tz, entry.slot_start_time),
            app_url.trim_end_matches('/'),
        ),
    }
}
